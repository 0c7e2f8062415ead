/// Line parsing
///
/// Turns one raw log line into a [`LogRecord`] under a selected [`Grammar`].
///
/// # Architecture
///
/// - `model.rs`: record, kind and grammar types
/// - `traits.rs`: the [`LineGrammar`] seam every grammar implements
/// - `formats/`: the plain and service grammars
/// - `metrics.rs`: tailing and correlation counters
///
/// Parsing is total: a line that fits no grammar becomes a
/// [`RecordKind::Continuation`] carrying the line unchanged. Nothing here
/// keeps state between calls.

pub mod traits;
pub mod formats;
pub mod metrics;
pub mod model;

use chrono::{DateTime, Utc};

pub use traits::LineGrammar;
pub use model::{Grammar, LogRecord, RecordKind};

use formats::{PlainGrammar, ServiceGrammar};

// Constants
pub const MAX_LINE_SIZE: usize = 1_048_576; // 1MB
pub const TAB_WIDTH: usize = 4; // spaces per tab, expanded during line assembly

static PLAIN: PlainGrammar = PlainGrammar;
static SERVICE: ServiceGrammar = ServiceGrammar;

/// Grammar implementation for a selector
pub fn grammar_for(grammar: Grammar) -> &'static dyn LineGrammar {
    match grammar {
        Grammar::Plain => &PLAIN,
        Grammar::Service => &SERVICE,
    }
}

/// Parse one line, stamping it with the current wall-clock time.
pub fn parse_line(line: &str, grammar: Grammar) -> LogRecord {
    parse_line_at(line, grammar, Utc::now())
}

/// Parse one line with an explicit ingest time. Never fails.
pub fn parse_line_at(line: &str, grammar: Grammar, ingest_time: DateTime<Utc>) -> LogRecord {
    grammar_for(grammar)
        .parse(line, ingest_time)
        .unwrap_or_else(|| LogRecord::continuation(ingest_time, line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_is_total() {
        let lines = [
            "",
            " ",
            "\u{0}",
            "garbage",
            "1001",
            "1001 10:00:00.000",
            "ünïcödé 10:00:00.000 x",
            "2024-03-01 10:00:00.123",
        ];
        for grammar in [Grammar::Plain, Grammar::Service] {
            for line in lines {
                let rec = parse_line(line, grammar);
                assert_eq!(rec.kind, RecordKind::Continuation, "line {:?}", line);
                assert_eq!(rec.body, line);
            }
        }
    }

    #[test]
    fn test_grammar_selector_dispatch() {
        let plain = "1001 10:00:00.000 hello";
        let service = "2024-03-01 10:00:00.123 [INF] [x] hello";

        assert_eq!(parse_line(plain, Grammar::Plain).kind, RecordKind::Data);
        assert_eq!(parse_line(plain, Grammar::Service).kind, RecordKind::Continuation);
        assert_eq!(parse_line(service, Grammar::Service).kind, RecordKind::ServiceEvent);
        assert_eq!(parse_line(service, Grammar::Plain).kind, RecordKind::Continuation);
        assert_eq!(grammar_for(Grammar::Service).grammar(), Grammar::Service);
    }

    #[test]
    fn test_parse_line_at_uses_given_time() {
        let at = Utc::now() - chrono::Duration::hours(1);
        let rec = parse_line_at("x", Grammar::Plain, at);
        assert_eq!(rec.ingest_time, at);
    }
}
