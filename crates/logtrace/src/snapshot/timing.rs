//! Timing — gaps between consecutive Data lines of one source.
//!
//! Computed on the consumer side from the textual `source_time`; the parser
//! and the ring never carry a duration.

use std::sync::Arc;

use chrono::{Duration, NaiveTime};
use serde::Serialize;

use crate::parser::{LogRecord, RecordKind};

const SOURCE_TIME_FORMAT: &str = "%H:%M:%S%.3f";

/// A record plus the time elapsed since the previous Data record.
#[derive(Debug, Clone, Serialize)]
pub struct TimedRecord {
    pub record: Arc<LogRecord>,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Option<Duration>,
}

impl TimedRecord {
    pub fn new(record: Arc<LogRecord>) -> Self {
        Self { record, duration: None }
    }

    /// `HH:MM:SS.mmm`, the way the source times themselves are written
    pub fn duration_text(&self) -> Option<String> {
        self.duration.map(format_duration)
    }
}

impl From<Arc<LogRecord>> for TimedRecord {
    fn from(record: Arc<LogRecord>) -> Self {
        Self::new(record)
    }
}

pub fn parse_source_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text.trim(), SOURCE_TIME_FORMAT).ok()
}

/// Fill in `duration` for every Data record that has a predecessor Data
/// record with a readable time. A time earlier than its predecessor is
/// taken to have crossed midnight.
pub fn annotate_durations(records: &mut [TimedRecord]) {
    let mut previous: Option<NaiveTime> = None;

    for timed in records.iter_mut() {
        if timed.record.kind != RecordKind::Data {
            continue;
        }
        let Some(now) = timed.record.source_time.as_deref().and_then(parse_source_time) else {
            timed.duration = None;
            continue;
        };

        timed.duration = previous.map(|prev| {
            let delta = now - prev;
            if delta < Duration::zero() {
                delta + Duration::days(1)
            } else {
                delta
            }
        });
        previous = Some(now);
    }
}

/// Wrap records and annotate them in one go
pub fn with_durations(records: impl IntoIterator<Item = Arc<LogRecord>>) -> Vec<TimedRecord> {
    let mut timed: Vec<TimedRecord> = records.into_iter().map(TimedRecord::new).collect();
    annotate_durations(&mut timed);
    timed
}

pub fn format_duration(d: Duration) -> String {
    let ms = d.num_milliseconds().max(0);
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    )
}

fn serialize_millis<S: serde::Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.num_milliseconds()),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_line, Grammar};

    fn rec(line: &str) -> Arc<LogRecord> {
        Arc::new(parse_line(line, Grammar::Plain))
    }

    #[test]
    fn test_consecutive_gaps() {
        let timed = with_durations(vec![
            rec("1 10:00:00.000 a"),
            rec("1 10:00:00.250 b"),
            rec("1 10:00:02.000 c"),
        ]);
        let gaps: Vec<_> = timed.iter().map(|t| t.duration.map(|d| d.num_milliseconds())).collect();
        assert_eq!(gaps, vec![None, Some(250), Some(1750)]);
    }

    #[test]
    fn test_other_kinds_are_skipped() {
        let timed = with_durations(vec![
            rec("1 10:00:00.000 a"),
            rec("    at stack frame"),
            Arc::new(LogRecord::system("Switched from x to y")),
            rec("1 10:00:01.000 b"),
        ]);
        assert!(timed[1].duration.is_none());
        assert!(timed[2].duration.is_none());
        assert_eq!(timed[3].duration, Some(Duration::seconds(1)));
    }

    #[test]
    fn test_wraps_across_midnight() {
        let timed = with_durations(vec![rec("1 23:59:59.900 a"), rec("1 00:00:00.100 b")]);
        assert_eq!(timed[1].duration, Some(Duration::milliseconds(200)));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::milliseconds(3_723_004)), "01:02:03.004");
        assert_eq!(format_duration(Duration::zero()), "00:00:00.000");

        let timed = with_durations(vec![rec("1 10:00:00.000 a"), rec("1 10:01:00.500 b")]);
        assert_eq!(timed[1].duration_text().as_deref(), Some("00:01:00.500"));
    }

    #[test]
    fn test_parse_source_time() {
        assert!(parse_source_time("10:00:00.000").is_some());
        assert!(parse_source_time("25:00:00.000").is_none());
        assert!(parse_source_time("soon").is_none());
    }
}
