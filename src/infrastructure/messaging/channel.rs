//! Message channel abstraction.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::infrastructure::resilience::Transient;

/// Errors reported by a [`MessageChannel`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// The broker could not be reached or the connection dropped.
    #[error("channel connection error: {0}")]
    Connection(String),

    #[error("channel operation timed out")]
    Timeout,

    /// The broker answered with an error for this request.
    #[error("channel rejected request: {0}")]
    Rejected(String),

    /// A received message could not be decoded.
    #[error("malformed message {id}: {reason}")]
    Malformed { id: String, reason: String },

    /// Invalid connection settings.
    #[error("channel configuration error: {0}")]
    Config(String),
}

impl Transient for ChannelError {
    fn is_transient(&self) -> bool {
        matches!(self, ChannelError::Connection(_) | ChannelError::Timeout)
    }
}

impl From<redis::RedisError> for ChannelError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            ChannelError::Timeout
        } else if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
            ChannelError::Connection(e.to_string())
        } else {
            ChannelError::Rejected(e.to_string())
        }
    }
}

/// One message received from a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Broker-assigned id, passed back to [`MessageChannel::ack`].
    pub id: String,
    pub payload: Vec<u8>,
}

/// Topic-based message broker.
///
/// Delivery is at-least-once: a message handed out by [`Self::consume`] stays
/// pending until it is acknowledged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Appends `payload` to `topic`.
    async fn send(&self, topic: &str, payload: &[u8]) -> Result<(), ChannelError>;

    /// Opens an endless stream of messages from `topic`.
    ///
    /// Errors are yielded as items; the stream keeps going after them.
    fn consume(&self, topic: &str) -> BoxStream<'static, Result<Delivery, ChannelError>>;

    /// Marks a delivered message as processed.
    async fn ack(&self, topic: &str, delivery_id: &str) -> Result<(), ChannelError>;
}
