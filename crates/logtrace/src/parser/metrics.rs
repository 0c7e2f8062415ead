use std::sync::atomic::{AtomicU64, Ordering};
use serde::Serialize;

use super::RecordKind;

/// Fault categories counted by the tailers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFaultType {
    /// Directory missing or no file matched the prefix
    Unavailable,
    /// A matching file exists but could not be opened
    OpenFailure,
    /// Listing the directory failed
    ScanFault,
    /// Reading an open file failed
    ReadError,
}

/// A wrapper that forces the wrapped data onto its own cache line(s).
///
/// Counters updated from the polling loop sit next to counters read by
/// foreground consumers; keeping each group on its own 64-byte line stops
/// the two from invalidating each other.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Records appended, by kind (hottest path - updated per line)
#[derive(Debug, Default)]
pub struct KindMetrics {
    pub data: AtomicU64,
    pub continuation: AtomicU64,
    pub service_event: AtomicU64,
    pub system: AtomicU64,
}

/// File-level activity
#[derive(Debug, Default)]
pub struct FileMetrics {
    pub bytes_read: AtomicU64,
    pub files_opened: AtomicU64,
    pub rotations: AtomicU64,
    pub oversized_lines: AtomicU64,
}

/// Fault counters by type
#[derive(Debug, Default)]
pub struct FaultMetrics {
    pub unavailable: AtomicU64,
    pub open_failure: AtomicU64,
    pub scan_fault: AtomicU64,
    pub read_error: AtomicU64,
}

/// Correlation store activity
#[derive(Debug, Default)]
pub struct CorrelationMetrics {
    pub messages_created: AtomicU64,
    pub messages_touched: AtomicU64,
    pub eviction_passes: AtomicU64,
    pub messages_evicted: AtomicU64,
}

/// Counters shared by every tailer and the correlator.
///
/// All operations use `Ordering::Relaxed`; `snapshot()` is not transactional
/// across groups, which is fine for observability.
#[derive(Debug, Default)]
pub struct TailMetrics {
    pub kinds: CacheAligned<KindMetrics>,
    pub files: CacheAligned<FileMetrics>,
    pub faults: CacheAligned<FaultMetrics>,
    pub correlation: CacheAligned<CorrelationMetrics>,
}

impl TailMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_append(&self, kind: RecordKind) {
        let counter = match kind {
            RecordKind::Data => &self.kinds.0.data,
            RecordKind::Continuation => &self.kinds.0.continuation,
            RecordKind::ServiceEvent => &self.kinds.0.service_event,
            RecordKind::System => &self.kinds.0.system,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_bytes(&self, n: u64) {
        self.files.0.bytes_read.fetch_add(n, Ordering::Relaxed);
    }

    /// Record a file being opened; `rotated` when it replaced another file
    pub fn record_open(&self, rotated: bool) {
        self.files.0.files_opened.fetch_add(1, Ordering::Relaxed);
        if rotated {
            self.files.0.rotations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_oversized_line(&self) {
        self.files.0.oversized_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self, fault: MetricFaultType) {
        let counter = match fault {
            MetricFaultType::Unavailable => &self.faults.0.unavailable,
            MetricFaultType::OpenFailure => &self.faults.0.open_failure,
            MetricFaultType::ScanFault => &self.faults.0.scan_fault,
            MetricFaultType::ReadError => &self.faults.0.read_error,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    // --- Correlation ---

    pub fn record_message(&self, created: bool) {
        if created {
            self.correlation.0.messages_created.fetch_add(1, Ordering::Relaxed);
        } else {
            self.correlation.0.messages_touched.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_eviction(&self, evicted: u64) {
        self.correlation.0.eviction_passes.fetch_add(1, Ordering::Relaxed);
        self.correlation.0.messages_evicted.fetch_add(evicted, Ordering::Relaxed);
    }

    // --- Snapshot Export ---

    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.kinds.0.data.load(Ordering::Relaxed);
        let continuation = self.kinds.0.continuation.load(Ordering::Relaxed);
        let service_event = self.kinds.0.service_event.load(Ordering::Relaxed);
        let system = self.kinds.0.system.load(Ordering::Relaxed);

        MetricsSnapshot {
            data_records: data,
            continuation_records: continuation,
            service_records: service_event,
            system_records: system,
            total_records: data + continuation + service_event + system,

            bytes_read: self.files.0.bytes_read.load(Ordering::Relaxed),
            files_opened: self.files.0.files_opened.load(Ordering::Relaxed),
            rotations: self.files.0.rotations.load(Ordering::Relaxed),
            oversized_lines: self.files.0.oversized_lines.load(Ordering::Relaxed),

            source_unavailable: self.faults.0.unavailable.load(Ordering::Relaxed),
            open_failures: self.faults.0.open_failure.load(Ordering::Relaxed),
            scan_faults: self.faults.0.scan_fault.load(Ordering::Relaxed),
            read_errors: self.faults.0.read_error.load(Ordering::Relaxed),

            messages_created: self.correlation.0.messages_created.load(Ordering::Relaxed),
            messages_touched: self.correlation.0.messages_touched.load(Ordering::Relaxed),
            eviction_passes: self.correlation.0.eviction_passes.load(Ordering::Relaxed),
            messages_evicted: self.correlation.0.messages_evicted.load(Ordering::Relaxed),
        }
    }
}

/// Read-only copy of [`TailMetrics`], cheap to clone and serialisable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Records by kind
    pub data_records: u64,
    pub continuation_records: u64,
    pub service_records: u64,
    pub system_records: u64,
    pub total_records: u64,

    // Files
    pub bytes_read: u64,
    pub files_opened: u64,
    pub rotations: u64,
    pub oversized_lines: u64,

    // Faults
    pub source_unavailable: u64,
    pub open_failures: u64,
    pub scan_faults: u64,
    pub read_errors: u64,

    // Correlation
    pub messages_created: u64,
    pub messages_touched: u64,
    pub eviction_passes: u64,
    pub messages_evicted: u64,
}
