//! Runtime module — daemon lifecycle: boot, scheduling, reporting, shutdown.

pub mod boot;
pub mod report;
pub mod scheduler;
pub mod stop;

pub use scheduler::{Scheduler, SchedulerError};
