//! Snapshot module — read-side helpers for consumers of the tailers.
//!
//! - `consolidated.rs`: newest records of every source in one list
//! - `timing.rs`: per-record gaps derived from source timestamps

pub mod consolidated;
pub mod timing;

pub use consolidated::{consolidated, ConsolidatedEntry};
pub use timing::{annotate_durations, TimedRecord};
