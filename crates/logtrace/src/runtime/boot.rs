//! Boot — logging init, config load, tailer and correlator wiring.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::TraceConfig;
use crate::correlate::Correlator;
use crate::parser::metrics::TailMetrics;
use crate::source::SourceTailer;

use super::report::{self, Summary, DEFAULT_REPORT_INTERVAL};
use super::scheduler::Scheduler;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logtrace=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Everything a running daemon owns.
pub struct App {
    pub config: TraceConfig,
    pub metrics: Arc<TailMetrics>,
    pub tailers: Vec<Arc<SourceTailer>>,
    pub correlator: Arc<Correlator>,
    pub scheduler: Scheduler,
}

/// Load config and wire up every source.
pub fn boot() -> anyhow::Result<App> {
    info!("Starting logtrace v{}", env!("CARGO_PKG_VERSION"));

    let config = TraceConfig::load().context("failed to load configuration")?;
    info!(
        "Loaded configuration: log_dir={}, sources={}, profile={}",
        config.log_dir.display(),
        config.sources.len(),
        config.profile.as_str()
    );
    build(config)
}

/// Wire up an [`App`] from an already loaded configuration.
pub fn build(config: TraceConfig) -> anyhow::Result<App> {
    config.validate().context("invalid configuration")?;

    let metrics = Arc::new(TailMetrics::new());
    let limits = config.correlator_limits();
    info!(
        "Correlator limits: threshold={}, evict_batch={}, history={}",
        limits.threshold, limits.evict_batch, limits.history_per_role
    );
    let correlator = Correlator::new(limits, Arc::clone(&metrics));

    let mut scheduler = Scheduler::new(Duration::from_millis(config.poll_interval_ms));
    let mut tailers = Vec::with_capacity(config.sources.len());

    for source in &config.sources {
        let tailer = SourceTailer::from_config(source, &config.log_dir, Arc::clone(&metrics));
        info!(
            "Source {}: {} in {} ({})",
            tailer.name(),
            tailer.prefix(),
            tailer.dir().display(),
            tailer.grammar().as_str()
        );
        if let Some(role) = source.role {
            correlator.attach(role, &tailer);
        }
        scheduler
            .add_source(Arc::clone(&tailer))
            .with_context(|| format!("failed to register source {}", source.name))?;
        tailers.push(tailer);
    }

    Ok(App {
        config,
        metrics,
        tailers,
        correlator,
        scheduler,
    })
}

impl App {
    pub fn tailer(&self, name: &str) -> Option<&Arc<SourceTailer>> {
        self.tailers.iter().find(|t| t.name() == name)
    }

    /// Start polling, plus the periodic summary log.
    pub fn start(&mut self) -> anyhow::Result<()> {
        self.scheduler.run().context("failed to start scheduler")?;
        tokio::spawn(report::report_loop(
            self.tailers.clone(),
            Arc::clone(&self.correlator),
            Arc::clone(&self.metrics),
            DEFAULT_REPORT_INTERVAL,
            self.scheduler.shutdown_receiver(),
        ));
        Ok(())
    }

    pub fn summary(&self) -> Summary {
        Summary::collect(&self.tailers, &self.correlator, &self.metrics)
    }

    pub async fn shutdown(&mut self) {
        self.scheduler.shutdown().await;
        self.correlator.detach();
        let summary = self.summary();
        info!(
            records = summary.total_records(),
            messages = summary.messages,
            "logtrace stopped"
        );
    }
}
