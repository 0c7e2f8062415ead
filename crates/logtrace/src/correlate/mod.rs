//! Correlate module — per-message traces across the receiver, engine and
//! sender streams.
//!
//! - `pattern.rs`: message-id extraction per role
//! - `record.rs`: `MessageRecord` and its per-role histories
//! - `store.rs`: bounded id → record map with batch eviction
//! - `collector.rs`: the `Correlator` subscriber

pub mod collector;
pub mod pattern;
pub mod record;
pub mod store;

pub use collector::Correlator;
pub use record::{MessageRecord, RoleHistory, ScoreAnnotation, StreamRole};
pub use store::{CorrelationStore, StoreLimits};
