//! Events announced to downstream consumers.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "event": "URL_CREATED",
//!   "short_code": "ba7816b",
//!   "long_url": "https://example.com/a",
//!   "correlation_id": "5f0c..."
//! }
//! ```
//!
//! `correlation_id` is `null` when the originating request carried none.
//! Consumers decode into [`InboundEvent`], which keeps `event` as a plain
//! string so that unknown event types can be recognized and skipped.

use serde::{Deserialize, Serialize};

/// Event name for newly created mappings.
pub const URL_CREATED: &str = "URL_CREATED";

/// Kinds of outbound events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "URL_CREATED")]
    UrlCreated,
}

/// Notification emitted once per successfully inserted mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlCreatedEvent {
    pub event: EventKind,
    pub short_code: String,
    pub long_url: String,
    pub correlation_id: Option<String>,
}

impl UrlCreatedEvent {
    pub fn new(short_code: String, long_url: String, correlation_id: Option<String>) -> Self {
        Self {
            event: EventKind::UrlCreated,
            short_code,
            long_url,
            correlation_id,
        }
    }

    /// Serializes the event to its JSON wire form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Loosely-typed view of any message on the events topic.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundEvent {
    pub event: String,
    #[serde(default)]
    pub short_code: Option<String>,
    #[serde(default)]
    pub long_url: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<String>,
}
