use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::parser::LogRecord;

/// Default number of records retained per source
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Fixed-capacity ring of the most recent records of one source.
///
/// One writer (the tailer, on the polling task) and any number of readers.
/// Index 0 is always the oldest retained record; once full, every push
/// evicts the oldest.
#[derive(Debug)]
pub struct SourceBuffer {
    records: RwLock<VecDeque<Arc<LogRecord>>>,
    capacity: usize,
}

impl SourceBuffer {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    /// Append a record, returning the one evicted to make room (if any)
    pub fn push(&self, record: Arc<LogRecord>) -> Option<Arc<LogRecord>> {
        let mut records = self.records.write();
        let evicted = if records.len() >= self.capacity {
            records.pop_front()
        } else {
            None
        };
        records.push_back(record);
        evicted
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record at `index`, 0 being the oldest retained
    pub fn get(&self, index: usize) -> Option<Arc<LogRecord>> {
        self.records.read().get(index).cloned()
    }

    pub fn last(&self) -> Option<Arc<LogRecord>> {
        self.records.read().back().cloned()
    }

    /// The newest `n` records, oldest first
    pub fn tail(&self, n: usize) -> Vec<Arc<LogRecord>> {
        let records = self.records.read();
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }

    /// Copy of `len` records starting at `start`, clipped to what is retained.
    ///
    /// Readers paging through a view take one consistent slice instead of
    /// calling [`get`](Self::get) per row while the writer keeps appending.
    pub fn range(&self, start: usize, len: usize) -> Vec<Arc<LogRecord>> {
        let records = self.records.read();
        records.iter().skip(start).take(len).cloned().collect()
    }
}

impl Default for SourceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
