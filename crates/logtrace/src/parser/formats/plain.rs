use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::parser::traits::*;

static PLAIN_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]+)\s([0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3})\s(.*)$")
        .expect("plain grammar regex is valid")
});

/// Parser for the mail services' own log files.
///
/// `1001 10:00:00.000 TX: <250 ...>` yields thread 1001, time `10:00:00.000`
/// and everything after the single separating space as body.
pub struct PlainGrammar;

impl LineGrammar for PlainGrammar {
    fn parse(&self, line: &str, ingest_time: DateTime<Utc>) -> Option<LogRecord> {
        let caps = PLAIN_LINE.captures(line)?;

        // An id too long for u64 is still a thread column; report it as absent.
        let thread_id = caps[1].parse::<u64>().unwrap_or(0);

        Some(LogRecord::data(
            ingest_time,
            thread_id,
            caps[2].to_string(),
            caps[3].to_string(),
        ))
    }

    fn grammar(&self) -> Grammar {
        Grammar::Plain
    }
}
