//! Consolidated — the newest few records of every source, one block each.

use std::sync::Arc;

use serde::Serialize;

use crate::parser::LogRecord;
use crate::source::SourceTailer;

pub const DEFAULT_PER_SOURCE: usize = 10;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsolidatedEntry {
    Record {
        source: String,
        /// File name (no directory) the source had open when sampled
        file: Option<String>,
        record: Arc<LogRecord>,
    },
    /// Ends the block of one source
    Separator,
}

impl ConsolidatedEntry {
    pub fn is_separator(&self) -> bool {
        matches!(self, ConsolidatedEntry::Separator)
    }

    pub fn record(&self) -> Option<&Arc<LogRecord>> {
        match self {
            ConsolidatedEntry::Record { record, .. } => Some(record),
            ConsolidatedEntry::Separator => None,
        }
    }
}

/// Newest `per_source` records of each source in the given order, oldest
/// first within a block. Sources with nothing buffered contribute nothing,
/// not even a separator.
pub fn consolidated(sources: &[Arc<SourceTailer>], per_source: usize) -> Vec<ConsolidatedEntry> {
    let mut out = Vec::new();

    for tailer in sources {
        let records = tailer.buffer().tail(per_source);
        if records.is_empty() {
            continue;
        }

        let file = tailer
            .current_file()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()));

        out.extend(records.into_iter().map(|record| ConsolidatedEntry::Record {
            source: tailer.name().to_string(),
            file: file.clone(),
            record,
        }));
        out.push(ConsolidatedEntry::Separator);
    }
    out
}
