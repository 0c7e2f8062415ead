//! Source module — one tailed log lineage per [`SourceTailer`].
//!
//! - `buffer.rs`: bounded ring of recent records
//! - `line.rs`: byte stream → lines (tab expansion, partial lines)
//! - `scan.rs`: newest matching file in a directory
//! - `publish.rs`: subscriber registry
//! - `tailer.rs`: rotation detection and incremental reading

pub mod buffer;
pub mod error;
pub mod line;
pub mod publish;
pub mod scan;
pub mod tailer;

pub use buffer::SourceBuffer;
pub use error::SourceError;
pub use publish::{RecordSubscriber, SourceId, SubscriptionId};
pub use tailer::{SourceTailer, TailerOptions};
