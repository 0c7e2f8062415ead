use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Line grammar a source is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grammar {
    /// `<thread-id> <HH:MM:SS.mmm> <body>` (mail services)
    #[default]
    Plain,
    /// `<date> <HH:MM:SS.mmm> ... [<severity>] [<id>] <body>` (config service)
    Service,
}

impl Grammar {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grammar::Plain => "plain",
            Grammar::Service => "service",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A line of the plain grammar
    Data,
    /// A line that matched no grammar (stack traces, wrapped output, ...)
    Continuation,
    /// A line of the service grammar
    ServiceEvent,
    /// Synthesised by the tailer itself (rotation, directory missing, ...)
    System,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Data => "data",
            RecordKind::Continuation => "continuation",
            RecordKind::ServiceEvent => "service_event",
            RecordKind::System => "system",
        }
    }
}

/// One parsed log line.
///
/// Records are immutable once built and shared as `Arc<LogRecord>` between the
/// source ring, subscribers and the correlator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    pub kind: RecordKind,

    /// Wall-clock time the line was parsed
    pub ingest_time: DateTime<Utc>,

    /// `HH:MM:SS.mmm` taken from the line itself
    pub source_time: Option<String>,

    /// Thread or session id of the writer, 0 when the grammar has none
    pub thread_id: u64,

    /// Only set for `ServiceEvent`
    pub severity: Option<String>,

    /// Only set for `ServiceEvent`
    pub correlation_id: Option<String>,

    /// Message text. For `Continuation` this is the whole line, verbatim.
    pub body: String,
}

impl LogRecord {
    pub fn data(
        ingest_time: DateTime<Utc>,
        thread_id: u64,
        source_time: String,
        body: String,
    ) -> Self {
        Self {
            kind: RecordKind::Data,
            ingest_time,
            source_time: Some(source_time),
            thread_id,
            severity: None,
            correlation_id: None,
            body,
        }
    }

    pub fn service_event(
        ingest_time: DateTime<Utc>,
        source_time: String,
        severity: String,
        correlation_id: String,
        body: String,
    ) -> Self {
        Self {
            kind: RecordKind::ServiceEvent,
            ingest_time,
            source_time: Some(source_time),
            thread_id: 0,
            severity: Some(severity),
            correlation_id: Some(correlation_id),
            body,
        }
    }

    /// Wrap a line no grammar understood, keeping it byte-for-byte.
    pub fn continuation(ingest_time: DateTime<Utc>, line: &str) -> Self {
        Self {
            kind: RecordKind::Continuation,
            ingest_time,
            source_time: None,
            thread_id: 0,
            severity: None,
            correlation_id: None,
            body: line.to_string(),
        }
    }

    pub fn system(body: impl Into<String>) -> Self {
        Self {
            kind: RecordKind::System,
            ingest_time: Utc::now(),
            source_time: None,
            thread_id: 0,
            severity: None,
            correlation_id: None,
            body: body.into(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.kind == RecordKind::System
    }
}
