//! Process-wide sequenced message logger.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parking_lot::Mutex;
use siteplan_core::{ClockSource, MessageRecord, MessageType, SystemClock};
use tracing::info;

use super::sink::{MessageSink, TracingSink};
use crate::service::{ManagedService, ServiceContext};

static GLOBAL: OnceLock<Arc<MessageLogger>> = OnceLock::new();

/// Counts and emits messages from concurrent producers.
///
/// A single mutex guards the counter and the sink call, so sequence numbers
/// are contiguous from 1 between resets and records reach the sink in
/// sequence order.
///
/// Components take an `Arc<MessageLogger>`; only the composition root reaches
/// for [`MessageLogger::global`].
pub struct MessageLogger {
    counter: Mutex<u64>,
    clock: Arc<dyn ClockSource>,
    sink: Arc<dyn MessageSink>,
}

impl MessageLogger {
    /// Logger with the system clock and a [`TracingSink`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_parts(Arc::new(TracingSink), Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_sink(sink: Arc<dyn MessageSink>) -> Self {
        Self::with_parts(sink, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_parts(sink: Arc<dyn MessageSink>, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            counter: Mutex::new(0),
            clock,
            sink,
        }
    }

    /// The process-wide logger, created on first use. Every caller, on any
    /// thread, receives the same instance.
    pub fn global() -> Arc<Self> {
        let logger = GLOBAL.get_or_init(|| {
            info!("process-wide message logger created");
            Arc::new(Self::new())
        });
        Arc::clone(logger)
    }

    /// Assigns the next sequence number, stamps the record, and emits it.
    /// Returns the assigned sequence number.
    pub fn log_message(&self, source: &str, message_type: MessageType, text: &str) -> u64 {
        let mut counter = self.counter.lock();
        *counter += 1;
        let record = MessageRecord {
            sequence: *counter,
            timestamp_ms: self.clock.now_millis(),
            source: source.to_string(),
            message_type,
            text: text.to_string(),
        };
        self.sink.emit(&record);
        record.sequence
    }

    pub fn log_warning(&self, source: &str, text: &str) -> u64 {
        self.log_message(source, MessageType::Warning, text)
    }

    pub fn log_error(&self, source: &str, text: &str) -> u64 {
        self.log_message(source, MessageType::Error, text)
    }

    /// Messages logged since creation or the last reset.
    #[must_use]
    pub fn count(&self) -> u64 {
        *self.counter.lock()
    }

    /// Restarts numbering; the next message gets sequence 1.
    pub fn reset(&self) {
        let mut counter = self.counter.lock();
        info!(previous = *counter, "message counter reset");
        *counter = 0;
    }
}

impl Default for MessageLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ManagedService for MessageLogger {
    fn name(&self) -> &'static str {
        "messages"
    }

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        info!(node = %ctx.config.node_name, count = self.count(), "message logger ready");
        Ok(())
    }

    async fn reset(&self) -> anyhow::Result<()> {
        MessageLogger::reset(self);
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        info!(total = self.count(), "message logger shut down");
        Ok(())
    }
}
