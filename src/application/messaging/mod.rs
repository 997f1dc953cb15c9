//! Event publication and consumption.

pub mod callbacks;
pub mod consumer;
pub mod publisher;

pub use callbacks::{HandlerError, MessageHandler, UrlEventHandler};
pub use consumer::EventConsumer;
pub use publisher::{BackgroundDispatcher, EventDispatcher, PublishOutcome, ResilientPublisher};

#[cfg(test)]
pub use publisher::MockEventDispatcher;
