//! Report — periodic one-line summary of what the daemon is tailing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::correlate::Correlator;
use crate::parser::metrics::{MetricsSnapshot, TailMetrics};
use crate::source::SourceTailer;

pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub file: Option<PathBuf>,
    pub records: usize,
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub sources: Vec<SourceSummary>,
    pub messages: usize,
    pub metrics: MetricsSnapshot,
}

impl Summary {
    pub fn collect(tailers: &[Arc<SourceTailer>], correlator: &Correlator, metrics: &TailMetrics) -> Self {
        Self {
            sources: tailers
                .iter()
                .map(|t| SourceSummary {
                    name: t.name().to_string(),
                    file: t.current_file(),
                    records: t.count(),
                    paused: t.is_paused(),
                })
                .collect(),
            messages: correlator.len(),
            metrics: metrics.snapshot(),
        }
    }

    pub fn open_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.file.is_some()).count()
    }

    pub fn total_records(&self) -> usize {
        self.sources.iter().map(|s| s.records).sum()
    }
}

/// Log a [`Summary`] every `period` until shutdown is signalled.
pub async fn report_loop(
    tailers: Vec<Arc<SourceTailer>>,
    correlator: Arc<Correlator>,
    metrics: Arc<TailMetrics>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                let summary = Summary::collect(&tailers, &correlator, &metrics);
                info!(
                    sources = summary.sources.len(),
                    open = summary.open_sources(),
                    records = summary.total_records(),
                    messages = summary.messages,
                    rotations = summary.metrics.rotations,
                    "tail summary"
                );
                match serde_json::to_string(&summary) {
                    Ok(json) => debug!("summary detail: {}", json),
                    Err(e) => warn!("Failed to serialise summary: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::StoreLimits;
    use crate::parser::Grammar;
    use crate::source::TailerOptions;
    use std::fs;

    #[test]
    fn test_summary_collect() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("MMReceiver.log"), "1 10:00:00.000 a\n2 10:00:00.000 b\n").unwrap();

        let metrics = Arc::new(TailMetrics::new());
        let rx = SourceTailer::new(
            "Receiver",
            dir.path(),
            "MMReceiver",
            Grammar::Plain,
            TailerOptions::default(),
            Arc::clone(&metrics),
        );
        let missing = SourceTailer::new(
            "Engine",
            dir.path().join("absent"),
            "MMEngine",
            Grammar::Plain,
            TailerOptions::default(),
            Arc::clone(&metrics),
        );
        rx.poll();
        missing.poll();
        missing.pause(true);

        let correlator = Correlator::new(StoreLimits::PRODUCTION, Arc::clone(&metrics));
        let summary = Summary::collect(&[rx, missing], &correlator, &metrics);

        assert_eq!(summary.sources.len(), 2);
        assert_eq!(summary.open_sources(), 1);
        assert_eq!(summary.total_records(), 3);
        assert!(summary.sources[1].paused);
        assert_eq!(summary.messages, 0);
        assert_eq!(summary.metrics.data_records, 2);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["sources"][0]["name"], "Receiver");
    }

    #[tokio::test]
    async fn test_report_loop_exits_on_shutdown() {
        let metrics = Arc::new(TailMetrics::new());
        let correlator = Correlator::new(StoreLimits::PRODUCTION, Arc::clone(&metrics));
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(report_loop(
            Vec::new(),
            correlator,
            metrics,
            Duration::from_millis(5),
            rx,
        ));
        time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        time::timeout(Duration::from_secs(5), task)
            .await
            .expect("report loop did not stop")
            .unwrap();
    }
}
