// Module structure for the logtrace tailing engine.

// Core infrastructure
pub mod parser;
pub mod source;

// Domain modules
pub mod correlate;
pub mod snapshot;

// Process
pub mod conf;
pub mod runtime;
