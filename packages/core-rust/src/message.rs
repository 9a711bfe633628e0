//! Log message vocabulary shared by producers and sinks.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a logged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Info,
    Warning,
    Error,
    Debug,
    System,
    Security,
}

impl MessageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Info => "INFO",
            MessageType::Warning => "WARNING",
            MessageType::Error => "ERROR",
            MessageType::Debug => "DEBUG",
            MessageType::System => "SYSTEM",
            MessageType::Security => "SECURITY",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sequenced log record.
///
/// `sequence` is assigned by the message logger and is unique between resets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sequence: u64,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub source: String,
    pub message_type: MessageType,
    pub text: String,
}

impl fmt::Display for MessageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {} #{}: {}",
            self.timestamp_ms, self.source, self.message_type, self.sequence, self.text
        )
    }
}
