//! Sequenced messages from concurrent producers.

pub mod logger;
pub mod sink;

pub use logger::MessageLogger;
pub use sink::{CompositeSink, MemorySink, MessageSink, TracingSink};
