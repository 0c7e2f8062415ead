use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::traits::{Grammar, LineGrammar, LogRecord};

static SERVICE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9]{4}-[0-9]{2}-[0-9]{2})\s([0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3}).*?\[(.*?)\]\s\[(.*?)\]\s(.*)$",
    )
    .expect("service grammar regex is valid")
});

/// Parser for the configuration service's structured log.
///
/// Anything between the time and the first bracket pair (timezone offsets,
/// process names) is skipped; the first two bracketed fields are severity and
/// correlation id.
pub struct ServiceGrammar;

impl LineGrammar for ServiceGrammar {
    fn parse(&self, line: &str, ingest_time: DateTime<Utc>) -> Option<LogRecord> {
        let caps = SERVICE_LINE.captures(line)?;

        Some(LogRecord::service_event(
            ingest_time,
            caps[2].to_string(),
            caps[3].to_string(),
            caps[4].to_string(),
            caps[5].to_string(),
        ))
    }

    fn grammar(&self) -> Grammar {
        Grammar::Service
    }
}
