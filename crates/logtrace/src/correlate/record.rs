use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::parser::LogRecord;

/// Which leg of a message's journey a source stream covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamRole {
    /// Receiver: message accepted from the network
    Ingress,
    /// Engine: policy processing
    Process,
    /// Sender: onward delivery
    Egress,
}

impl StreamRole {
    pub const ALL: [StreamRole; 3] = [StreamRole::Ingress, StreamRole::Process, StreamRole::Egress];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamRole::Ingress => "ingress",
            StreamRole::Process => "process",
            StreamRole::Egress => "egress",
        }
    }
}

/// Scores the receiver's spam profiler logs against a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScoreAnnotation {
    pub score: u32,
    pub rescan: u32,
    pub bulk: u32,
}

/// Recent lines of one role plus when that role first and last saw the message.
#[derive(Debug, Clone, Serialize)]
pub struct RoleHistory {
    #[serde(skip)]
    records: VecDeque<Arc<LogRecord>>,
    capacity: usize,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
}

impl RoleHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            first_seen: None,
            last_seen: None,
        }
    }

    pub fn push(&mut self, record: Arc<LogRecord>) {
        if let Some(time) = &record.source_time {
            if self.first_seen.is_none() {
                self.first_seen = Some(time.clone());
            }
            self.last_seen = Some(time.clone());
        }
        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Oldest first
    pub fn records(&self) -> impl Iterator<Item = &Arc<LogRecord>> {
        self.records.iter()
    }
}

/// Everything known about one message id across the three streams.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub message_id: String,
    /// Wall-clock time of the latest contribution from any role
    pub touch_time: DateTime<Utc>,
    /// Source time of the "accepted for delivery" line
    pub rx_time: Option<String>,
    pub score: Option<ScoreAnnotation>,
    pub ingress: RoleHistory,
    pub process: RoleHistory,
    pub egress: RoleHistory,
}

impl MessageRecord {
    pub fn new(message_id: impl Into<String>, touch_time: DateTime<Utc>, history: usize) -> Self {
        Self {
            message_id: message_id.into(),
            touch_time,
            rx_time: None,
            score: None,
            ingress: RoleHistory::new(history),
            process: RoleHistory::new(history),
            egress: RoleHistory::new(history),
        }
    }

    pub fn history(&self, role: StreamRole) -> &RoleHistory {
        match role {
            StreamRole::Ingress => &self.ingress,
            StreamRole::Process => &self.process,
            StreamRole::Egress => &self.egress,
        }
    }

    pub fn history_mut(&mut self, role: StreamRole) -> &mut RoleHistory {
        match role {
            StreamRole::Ingress => &mut self.ingress,
            StreamRole::Process => &mut self.process,
            StreamRole::Egress => &mut self.egress,
        }
    }

    /// Roles that have contributed at least one line
    pub fn roles_seen(&self) -> Vec<StreamRole> {
        StreamRole::ALL
            .into_iter()
            .filter(|r| !self.history(*r).is_empty())
            .collect()
    }
}
