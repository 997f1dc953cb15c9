//! Messaging adapters: the event channel and its dead-letter fallback.
//!
//! - [`MessageChannel`] / [`RedisStreamChannel`] - topic send, consume and ack
//! - [`DeadLetterSink`] - durable store for events the channel did not accept

pub mod channel;
pub mod dead_letter;
pub mod redis_streams;

pub use channel::{ChannelError, Delivery, MessageChannel};
pub use dead_letter::{DeadLetterError, DeadLetterSink};
pub use redis_streams::{RedisStreamChannel, StreamChannelConfig};

#[cfg(test)]
pub use channel::MockMessageChannel;
#[cfg(test)]
pub use dead_letter::MockDeadLetterSink;
