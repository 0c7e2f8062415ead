use chrono::{DateTime, Utc};

pub use super::model::{Grammar, LogRecord, RecordKind};

pub trait LineGrammar: Send + Sync {
    /// parse one newline-stripped line, `None` when it does not fit this grammar
    fn parse(&self, line: &str, ingest_time: DateTime<Utc>) -> Option<LogRecord>;
    fn grammar(&self) -> Grammar;
}
