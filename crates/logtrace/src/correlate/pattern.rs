//! Pattern — message-id extraction from free-text log bodies.
//!
//! Each role has an ordered list of patterns; the first that matches wins.

use once_cell::sync::Lazy;
use regex::Regex;

use super::record::{ScoreAnnotation, StreamRole};

/// Receiver confirmation sent back to the client.
pub const ACCEPTED: &str = r"^TX:\s<250\s(\w+)\sMessage\saccepted\sfor\sdelivery>$";

/// Spam profiler result line, keyed by the queued message file name.
pub const SCORED: &str = r"^([A-E][0-9a-fA-F]{12})\.[0-9a-fA-F]{12}\.[0-9a-fA-F]{4}\.mml\sSpamProfiler\sscore:\s([0-9]+),\srescan:\s([0-9]+),\sbulk:\s([0-9]+)";

/// Any mention of a queued message file; the id is its first segment.
pub const MESSAGE_FILE: &str = r"([A-E][0-9a-fA-F]{12})\.[0-9a-fA-F]{12}\.[0-9a-fA-F]{4}\.mml";

static ACCEPTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(ACCEPTED).expect("valid accepted pattern"));
static SCORED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(SCORED).expect("valid scored pattern"));
static MESSAGE_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(MESSAGE_FILE).expect("valid message file pattern"));

/// What a matching line says about its message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Receiver accepted the message for delivery
    Accepted { message_id: String },
    /// Spam profiler verdict
    Scored { message_id: String, score: ScoreAnnotation },
    /// Message mentioned, nothing else learned
    Seen { message_id: String },
}

impl Extraction {
    pub fn message_id(&self) -> &str {
        match self {
            Extraction::Accepted { message_id }
            | Extraction::Scored { message_id, .. }
            | Extraction::Seen { message_id } => message_id,
        }
    }
}

/// Run the role's patterns over `body`.
pub fn extract(role: StreamRole, body: &str) -> Option<Extraction> {
    match role {
        StreamRole::Ingress => extract_ingress(body),
        StreamRole::Process | StreamRole::Egress => seen(body),
    }
}

fn extract_ingress(body: &str) -> Option<Extraction> {
    if let Some(caps) = ACCEPTED_RE.captures(body) {
        return Some(Extraction::Accepted {
            message_id: caps[1].to_string(),
        });
    }

    if let Some(caps) = SCORED_RE.captures(body) {
        let num = |i: usize| caps[i].parse::<u32>().unwrap_or(u32::MAX);
        return Some(Extraction::Scored {
            message_id: caps[1].to_string(),
            score: ScoreAnnotation {
                score: num(2),
                rescan: num(3),
                bulk: num(4),
            },
        });
    }

    seen(body)
}

fn seen(body: &str) -> Option<Extraction> {
    MESSAGE_FILE_RE.captures(body).map(|caps| Extraction::Seen {
        message_id: caps[1].to_string(),
    })
}
