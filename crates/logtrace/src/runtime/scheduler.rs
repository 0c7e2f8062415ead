//! Scheduler — the single background task that drives every tailer.
//!
//! Sources are polled in registration order once per tick. A tick that
//! overruns is skipped rather than bunched up. Polling does plain file I/O,
//! so every pass runs on the blocking pool and the loop awaits it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::source::SourceTailer;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Poll interval must be greater than zero")]
    ZeroInterval,

    #[error("Scheduler must be started from within a Tokio runtime")]
    NoRuntime,
}

pub struct Scheduler {
    interval: Duration,
    sources: Vec<Arc<SourceTailer>>,
    shutdown_tx: watch::Sender<bool>,
    cycles: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            interval,
            sources: Vec::new(),
            shutdown_tx,
            cycles: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    /// Register a tailer. Only allowed before [`run`](Self::run).
    pub fn add_source(&mut self, tailer: Arc<SourceTailer>) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        debug!(source = %tailer.name(), "source registered with scheduler");
        self.sources.push(tailer);
        Ok(())
    }

    pub fn sources(&self) -> &[Arc<SourceTailer>] {
        &self.sources
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Completed polling cycles since [`run`](Self::run)
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// A receiver that flips to `true` when [`shutdown`](Self::shutdown) starts
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn the polling task on the current Tokio runtime.
    pub fn run(&mut self) -> Result<(), SchedulerError> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if self.interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        // a scheduler may be restarted after shutdown
        self.shutdown_tx.send_replace(false);
        let shutdown_rx = self.shutdown_tx.subscribe();

        info!(
            sources = self.sources.len(),
            interval_ms = self.interval.as_millis() as u64,
            "starting scheduler"
        );

        self.handle = Some(runtime.spawn(poll_loop(
            Arc::new(self.sources.clone()),
            self.interval,
            shutdown_rx,
            Arc::clone(&self.cycles),
        )));
        Ok(())
    }

    /// Stop the polling task and close every source.
    ///
    /// Returns once the task has exited; no buffer changes after that.
    pub async fn shutdown(&mut self) {
        self.shutdown_tx.send_replace(true);

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }

        for tailer in &self.sources {
            tailer.close();
        }
        info!(cycles = self.cycles(), "scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            warn!("Scheduler dropped while running; aborting polling task");
            self.shutdown_tx.send_replace(true);
            handle.abort();
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("sources", &self.sources.len())
            .field("running", &self.is_running())
            .finish()
    }
}

async fn poll_loop(
    sources: Arc<Vec<Arc<SourceTailer>>>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    cycles: Arc<AtomicU64>,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!("Received shutdown signal, stopping poll loop");
                    break;
                }
            }
            _ = interval.tick() => {
                let batch = Arc::clone(&sources);
                if let Err(e) = task::spawn_blocking(move || poll_all(&batch)).await {
                    error!("Poll cycle failed to complete: {}", e);
                }
                cycles.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// One pass over every source. A panicking source is logged and skipped.
fn poll_all(sources: &[Arc<SourceTailer>]) {
    for tailer in sources {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| tailer.poll())) {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(source = %tailer.name(), "poll panicked: {}", msg);
        }
    }
}
