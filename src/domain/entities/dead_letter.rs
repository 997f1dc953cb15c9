//! Dead-letter entry entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An outbound event parked in the dead-letter sink.
///
/// `payload` holds the serialized event exactly as it would have been sent to
/// the channel, so entries can be replayed without re-encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub topic: String,
    pub payload: String,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(topic: impl Into<String>, payload: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }
}
