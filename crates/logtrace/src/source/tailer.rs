//! Tailer — follows the newest file of one source and feeds its ring.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::conf::SourceConfig;
use crate::parser::metrics::TailMetrics;
use crate::parser::{self, Grammar, LogRecord, MAX_LINE_SIZE};

use super::buffer::{SourceBuffer, DEFAULT_CAPACITY};
use super::error::SourceError;
use super::line::{LineAssembler, LineEvent};
use super::publish::{RecordSubscriber, SourceId, SubscriberList, SubscriptionId};
use super::scan;

pub const DEFAULT_ROTATION_CHECK: Duration = Duration::from_secs(2);
pub const DEFAULT_SEEK_THRESHOLD: u64 = 20 * 8192;

const READ_CHUNK: usize = 8192;

/// Tunables of one tailer
#[derive(Debug, Clone)]
pub struct TailerOptions {
    pub capacity: usize,
    /// Minimum wall-clock time between two directory scans
    pub rotation_check: Duration,
    /// Files larger than this are opened this many bytes before their end
    pub seek_threshold: u64,
    pub max_line: usize,
}

impl Default for TailerOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            rotation_check: DEFAULT_ROTATION_CHECK,
            seek_threshold: DEFAULT_SEEK_THRESHOLD,
            max_line: MAX_LINE_SIZE,
        }
    }
}

impl From<&SourceConfig> for TailerOptions {
    fn from(cfg: &SourceConfig) -> Self {
        Self {
            capacity: cfg.capacity,
            rotation_check: Duration::from_secs(cfg.rotation_check_secs),
            seek_threshold: cfg.seek_threshold_bytes,
            max_line: MAX_LINE_SIZE,
        }
    }
}

struct OpenFile {
    path: PathBuf,
    file: File,
}

/// State only the polling task touches.
struct TailState {
    file: Option<OpenFile>,
    assembler: LineAssembler,
    last_check: Option<Instant>,
    last_ingest: DateTime<Utc>,
}

impl TailState {
    /// Wall-clock time that never runs backwards within this source
    fn stamp(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        if at > self.last_ingest {
            self.last_ingest = at;
        }
        self.last_ingest
    }
}

/// One source stream: a directory plus a file-name prefix.
///
/// [`poll`](Self::poll) is driven by the scheduler; every other method is
/// safe to call from any thread at any time.
pub struct SourceTailer {
    id: SourceId,
    name: String,
    dir: PathBuf,
    prefix: String,
    grammar: Grammar,
    options: TailerOptions,
    buffer: SourceBuffer,
    subscribers: SubscriberList,
    paused: AtomicBool,
    current: RwLock<Option<PathBuf>>,
    state: Mutex<TailState>,
    metrics: Arc<TailMetrics>,
}

impl SourceTailer {
    pub fn new(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        grammar: Grammar,
        options: TailerOptions,
        metrics: Arc<TailMetrics>,
    ) -> Arc<Self> {
        let max_line = options.max_line;
        Arc::new(Self {
            id: SourceId::next(),
            name: name.into(),
            dir: dir.into(),
            prefix: prefix.into(),
            grammar,
            buffer: SourceBuffer::new(options.capacity),
            options,
            subscribers: SubscriberList::new(),
            paused: AtomicBool::new(false),
            current: RwLock::new(None),
            state: Mutex::new(TailState {
                file: None,
                assembler: LineAssembler::new(max_line),
                last_check: None,
                last_ingest: DateTime::<Utc>::MIN_UTC,
            }),
            metrics,
        })
    }

    /// Build from configuration; a relative or missing `dir` resolves against `log_dir`.
    pub fn from_config(cfg: &SourceConfig, log_dir: &Path, metrics: Arc<TailMetrics>) -> Arc<Self> {
        Self::new(
            cfg.name.clone(),
            cfg.resolve_dir(log_dir),
            cfg.prefix.clone(),
            cfg.grammar,
            TailerOptions::from(cfg),
            metrics,
        )
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// Path of the file currently open, if any
    pub fn current_file(&self) -> Option<PathBuf> {
        self.current.read().clone()
    }

    // ── Read interface ──────────────────────────────────────────

    pub fn count(&self) -> usize {
        self.buffer.len()
    }

    /// Record at `index`, 0 being the oldest retained
    pub fn get_entry(&self, index: usize) -> Option<Arc<LogRecord>> {
        self.buffer.get(index)
    }

    pub fn buffer(&self) -> &SourceBuffer {
        &self.buffer
    }

    pub fn pause(&self, paused: bool) {
        let was = self.paused.swap(paused, Ordering::Relaxed);
        if was != paused {
            debug!(source = %self.name, paused, "tailer pause state changed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    // ── Publish interface ───────────────────────────────────────

    pub fn subscribe<S: RecordSubscriber + 'static>(&self, subscriber: &Arc<S>) -> SubscriptionId {
        let weak = Arc::downgrade(subscriber);
        self.subscribers.subscribe(weak)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    // ── Polling ─────────────────────────────────────────────────

    /// One tailing cycle: maybe rescan the directory, then read whatever is
    /// available. Never blocks waiting for data and never fails.
    pub fn poll(&self) {
        if self.is_paused() {
            return;
        }

        let mut state = self.state.lock();
        self.check_for_file(&mut state);
        if state.file.is_some() {
            self.read_available(&mut state);
        }
    }

    /// Drop the open file. The next poll rescans and reopens from scratch.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if let Some(open) = state.file.take() {
            debug!(source = %self.name, file = %open.path.display(), "closing log file");
        }
        state.assembler.reset();
        state.last_check = None;
        *self.current.write() = None;
    }

    fn check_for_file(&self, state: &mut TailState) {
        let now = Instant::now();
        if let Some(last) = state.last_check {
            if now.duration_since(last) < self.options.rotation_check {
                return;
            }
        }
        state.last_check = Some(now);

        let latest = match scan::newest_matching(&self.dir, &self.prefix) {
            Ok(Some(path)) => path,
            Ok(None) => {
                let err = SourceError::NoMatchingFile {
                    dir: self.dir.clone(),
                    prefix: self.prefix.clone(),
                };
                self.report(state, err);
                return;
            }
            Err(err) => {
                self.report(state, err);
                return;
            }
        };

        if matches!(&state.file, Some(open) if open.path == latest) {
            return;
        }

        let opened = open_at_tail(&latest, self.options.seek_threshold);
        self.switch_to(state, latest, opened);
    }

    /// Move to `latest`. The old file stays open, and keeps being read,
    /// until the new one has been opened.
    fn switch_to(
        &self,
        state: &mut TailState,
        latest: PathBuf,
        opened: Result<(File, bool), SourceError>,
    ) {
        let (file, seeked) = match opened {
            Ok(opened) => opened,
            Err(err) => {
                self.report(state, err);
                return;
            }
        };

        let previous = state.file.as_ref().map(|open| open.path.clone());
        if previous.is_some() {
            // finish the old file before letting go of it
            self.read_available(state);
            if let Some(line) = state.assembler.flush() {
                self.append_line(state, line);
            }
        }

        state.assembler.reset();
        if seeked {
            state.assembler.discard_until_newline();
        }
        state.file = Some(OpenFile {
            path: latest.clone(),
            file,
        });
        *self.current.write() = Some(latest.clone());
        self.metrics.record_open(previous.is_some());

        // only a switch is surfaced in the ring; a first open is just logged
        match previous {
            Some(old) => {
                info!(
                    source = %self.name,
                    from = %old.display(),
                    to = %latest.display(),
                    "log file rotated"
                );
                let body = format!("Switched from {} to {}", old.display(), latest.display());
                self.append(state, LogRecord::system(body));
            }
            None => {
                info!(source = %self.name, file = %latest.display(), seeked, "opened log file");
            }
        }
    }

    /// Read until end of data. A partial last line stays pending.
    fn read_available(&self, state: &mut TailState) {
        let mut chunk = [0u8; READ_CHUNK];
        let mut lines = Vec::new();

        loop {
            let Some(open) = state.file.as_mut() else {
                return;
            };

            match open.file.read(&mut chunk) {
                Ok(0) => return,
                Ok(n) => {
                    self.metrics.record_bytes(n as u64);
                    state.assembler.feed(&chunk[..n], &mut lines);
                    for event in lines.drain(..) {
                        if matches!(event, LineEvent::Overflow(_)) {
                            self.metrics.record_oversized_line();
                            debug!(
                                source = %self.name,
                                limit = self.options.max_line,
                                "line cut at size limit"
                            );
                        }
                        self.append_line(state, event.into_text());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    let err = SourceError::Read {
                        path: open.path.clone(),
                        source: e,
                    };
                    warn!(source = %self.name, error = %err, "read failed");
                    self.metrics.record_fault(err.fault_type());
                    if let Some(line) = state.assembler.flush() {
                        self.append_line(state, line);
                    }
                    return;
                }
            }
        }
    }

    fn append_line(&self, state: &mut TailState, line: String) {
        let record = parser::parse_line(&line, self.grammar);
        self.append(state, record);
    }

    fn append(&self, state: &mut TailState, mut record: LogRecord) {
        record.ingest_time = state.stamp(record.ingest_time);
        let record = Arc::new(record);
        self.metrics.record_append(record.kind);
        self.buffer.push(Arc::clone(&record));
        self.subscribers.publish(self.id, &record);
    }

    /// Surface a lookup/open problem, at most once while the ring is empty.
    fn report(&self, state: &mut TailState, err: SourceError) {
        self.metrics.record_fault(err.fault_type());
        if self.buffer.is_empty() {
            warn!(source = %self.name, error = %err, "log source unavailable");
            self.append(state, LogRecord::system(err.to_string()));
        } else {
            debug!(source = %self.name, error = %err, "log source unavailable");
        }
    }
}

impl std::fmt::Debug for SourceTailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTailer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("prefix", &self.prefix)
            .field("grammar", &self.grammar)
            .field("count", &self.count())
            .field("paused", &self.is_paused())
            .finish()
    }
}

/// Open `path`; when it is larger than `threshold`, position the handle
/// `threshold` bytes before the end. Returns whether a seek happened.
fn open_at_tail(path: &Path, threshold: u64) -> Result<(File, bool), SourceError> {
    let open_failure = |source| SourceError::OpenFailure {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(open_failure)?;
    let size = file.metadata().map_err(open_failure)?.len();
    if size <= threshold {
        return Ok((file, false));
    }

    let back = size.min(threshold);
    file.seek(SeekFrom::End(-(back as i64))).map_err(open_failure)?;
    Ok((file, true))
}
