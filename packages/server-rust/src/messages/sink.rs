//! Destinations for sequenced message records.
//!
//! Defines [`MessageSink`], the [`TracingSink`] used by default, an in-memory
//! [`MemorySink`], and [`CompositeSink`] which fans records out to several
//! sinks.

use std::sync::Arc;

use parking_lot::Mutex;
use siteplan_core::{MessageRecord, MessageType};
use tracing::{debug, error, info, warn};

/// Receives every record emitted by a
/// [`MessageLogger`](super::MessageLogger).
///
/// `emit` runs while the logger's lock is held, so records arrive in
/// sequence order. Implementations must not log through the same logger.
pub trait MessageSink: Send + Sync {
    fn emit(&self, record: &MessageRecord);
}

/// Forwards records as structured `tracing` events.
///
/// `Error` records map to `error!`, `Warning` to `warn!`, `Debug` to
/// `debug!`, everything else to `info!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn emit(&self, record: &MessageRecord) {
        let sequence = record.sequence;
        let timestamp_ms = record.timestamp_ms;
        let source = record.source.as_str();
        let kind = record.message_type.as_str();
        let text = record.text.as_str();
        match record.message_type {
            MessageType::Error => error!(sequence, timestamp_ms, source, kind, "{text}"),
            MessageType::Warning => warn!(sequence, timestamp_ms, source, kind, "{text}"),
            MessageType::Debug => debug!(sequence, timestamp_ms, source, kind, "{text}"),
            MessageType::Info | MessageType::System | MessageType::Security => {
                info!(sequence, timestamp_ms, source, kind, "{text}");
            }
        }
    }
}

/// Keeps every record in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<MessageRecord>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records seen so far.
    #[must_use]
    pub fn records(&self) -> Vec<MessageRecord> {
        self.records.lock().clone()
    }

    /// Records from `source`, in emission order.
    #[must_use]
    pub fn records_from(&self, source: &str) -> Vec<MessageRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.source == source)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn count_of(&self, message_type: MessageType) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.message_type == message_type)
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl MessageSink for MemorySink {
    fn emit(&self, record: &MessageRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Fans every record out to each inner sink, in insertion order.
#[derive(Default)]
pub struct CompositeSink {
    sinks: Vec<Arc<dyn MessageSink>>,
}

impl CompositeSink {
    #[must_use]
    pub fn new(sinks: Vec<Arc<dyn MessageSink>>) -> Self {
        Self { sinks }
    }

    pub fn add(&mut self, sink: Arc<dyn MessageSink>) {
        self.sinks.push(sink);
    }
}

impl MessageSink for CompositeSink {
    fn emit(&self, record: &MessageRecord) {
        for sink in &self.sinks {
            sink.emit(record);
        }
    }
}
