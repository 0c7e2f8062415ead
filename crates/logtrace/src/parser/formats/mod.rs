/// Line grammars, one per log family

pub mod plain;
pub mod service;

pub use plain::PlainGrammar;
pub use service::ServiceGrammar;
