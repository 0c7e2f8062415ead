use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::parser::metrics::MetricFaultType;

/// Conditions a tailer meets while looking for or reading its file.
///
/// None of these leave [`SourceTailer::poll`](super::SourceTailer::poll);
/// they are logged, counted and surfaced as System records.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Directory does not exist or is not a directory: {}", dir.display())]
    SourceUnavailable { dir: PathBuf },

    #[error("No log file matching '{prefix}' in {}", dir.display())]
    NoMatchingFile { dir: PathBuf, prefix: String },

    #[error("Error loading log file for {}: {source}", path.display())]
    OpenFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error loading log file for {prefix} - {source}")]
    ScanFault {
        prefix: String,
        #[source]
        source: io::Error,
    },

    #[error("Read failed on {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    pub fn fault_type(&self) -> MetricFaultType {
        match self {
            SourceError::SourceUnavailable { .. } | SourceError::NoMatchingFile { .. } => {
                MetricFaultType::Unavailable
            }
            SourceError::OpenFailure { .. } => MetricFaultType::OpenFailure,
            SourceError::ScanFault { .. } => MetricFaultType::ScanFault,
            SourceError::Read { .. } => MetricFaultType::ReadError,
        }
    }
}
