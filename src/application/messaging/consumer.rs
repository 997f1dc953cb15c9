//! Long-running consumption loop for the events topic.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::callbacks::MessageHandler;
use crate::infrastructure::messaging::{ChannelError, MessageChannel};

/// Feeds every message of a topic to a [`MessageHandler`].
///
/// A message is acknowledged after its handler returns, whatever the result.
/// Cancellation is only observed while waiting for the next message, so a
/// message that is being handled is always finished and acknowledged.
pub struct EventConsumer {
    channel: Arc<dyn MessageChannel>,
    handler: Arc<dyn MessageHandler>,
    topic: String,
    error_backoff: Duration,
}

impl EventConsumer {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        handler: Arc<dyn MessageHandler>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            handler,
            topic: topic.into(),
            error_backoff: Duration::from_secs(1),
        }
    }

    /// Runs until `shutdown` fires or the channel stream ends.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut messages = self.channel.consume(&self.topic);
        info!(topic = %self.topic, "Event consumer started");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = messages.next() => next,
            };

            match next {
                Some(Ok(delivery)) => {
                    if let Err(e) = self.handler.handle(&delivery.payload).await {
                        warn!(
                            topic = %self.topic,
                            id = %delivery.id,
                            raw = %String::from_utf8_lossy(&delivery.payload),
                            error = %e,
                            "Message handler failed"
                        );
                    }
                    self.acknowledge(&delivery.id).await;
                }
                Some(Err(ChannelError::Malformed { id, reason })) => {
                    warn!(topic = %self.topic, id = %id, reason = %reason, "Skipping malformed message");
                    self.acknowledge(&id).await;
                }
                Some(Err(e)) => {
                    warn!(topic = %self.topic, error = %e, "Consume failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
                None => {
                    warn!(topic = %self.topic, "Message stream ended");
                    break;
                }
            }
        }

        info!(topic = %self.topic, "Event consumer stopped");
    }

    async fn acknowledge(&self, id: &str) {
        if let Err(e) = self.channel.ack(&self.topic, id).await {
            warn!(topic = %self.topic, id, error = %e, "Failed to acknowledge message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::messaging::callbacks::{HandlerError, MockMessageHandler};
    use crate::infrastructure::messaging::{Delivery, MockMessageChannel};
    use futures_util::stream;
    use mockall::Sequence;

    fn delivery(id: &str, payload: &str) -> Result<Delivery, ChannelError> {
        Ok(Delivery {
            id: id.to_string(),
            payload: payload.as_bytes().to_vec(),
        })
    }

    fn decode_error() -> HandlerError {
        serde_json::from_str::<serde_json::Value>("{").unwrap_err().into()
    }

    #[tokio::test]
    async fn test_handler_failure_does_not_stop_loop_and_each_message_is_acked() {
        let items = vec![delivery("1-0", "bad"), delivery("2-0", "good")];
        let mut channel = MockMessageChannel::new();
        channel
            .expect_consume()
            .times(1)
            .returning(move |_| stream::iter(items.clone()).boxed());

        let mut seq = Sequence::new();
        channel
            .expect_ack()
            .withf(|_, id| id.to_string() == "1-0")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        channel
            .expect_ack()
            .withf(|_, id| id.to_string() == "2-0")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let mut handler = MockMessageHandler::new();
        handler.expect_handle().times(2).returning(|payload| {
            if payload == b"bad" {
                Err(decode_error())
            } else {
                Ok(())
            }
        });

        EventConsumer::new(Arc::new(channel), Arc::new(handler), "url_created")
            .run(CancellationToken::new())
            .await;
    }

    #[tokio::test]
    async fn test_malformed_entries_are_acked_without_handling() {
        let items = vec![Err(ChannelError::Malformed {
            id: "3-0".to_string(),
            reason: "missing field".to_string(),
        })];
        let mut channel = MockMessageChannel::new();
        channel
            .expect_consume()
            .returning(move |_| stream::iter(items.clone()).boxed());
        channel.expect_ack().times(1).returning(|_, _| Ok(()));

        let mut handler = MockMessageHandler::new();
        handler.expect_handle().never();

        EventConsumer::new(Arc::new(channel), Arc::new(handler), "url_created")
            .run(CancellationToken::new())
            .await;
    }

    #[tokio::test]
    async fn test_cancellation_stops_idle_loop() {
        let mut channel = MockMessageChannel::new();
        channel
            .expect_consume()
            .returning(|_| stream::pending().boxed());
        channel.expect_ack().never();

        let handler = MockMessageHandler::new();
        let shutdown = CancellationToken::new();

        let consumer = EventConsumer::new(Arc::new(channel), Arc::new(handler), "url_created");
        let task = tokio::spawn(consumer.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("consumer stops promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancellation_mid_handle_finishes_and_acks_in_flight_message() {
        let items = vec![delivery("5-0", "{}"), delivery("6-0", "{}")];
        let mut channel = MockMessageChannel::new();
        channel.expect_consume().times(1).returning(move |_| {
            stream::iter(items.clone())
                .chain(stream::pending())
                .boxed()
        });
        channel
            .expect_ack()
            .withf(|_, id| id.to_string() == "5-0")
            .times(1)
            .returning(|_, _| Ok(()));

        let shutdown = CancellationToken::new();
        let canceller = shutdown.clone();
        let mut handler = MockMessageHandler::new();
        handler
            .expect_handle()
            .times(1)
            .returning(move |_| {
                canceller.cancel();
                Ok(())
            });

        let consumer = EventConsumer::new(Arc::new(channel), Arc::new(handler), "url_created");

        tokio::time::timeout(Duration::from_secs(1), consumer.run(shutdown))
            .await
            .expect("consumer stops after the in-flight message");
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_errors_back_off_and_continue() {
        let items = vec![
            Err(ChannelError::Connection("reset".to_string())),
            delivery("4-0", "{}"),
        ];
        let mut channel = MockMessageChannel::new();
        channel
            .expect_consume()
            .returning(move |_| stream::iter(items.clone()).boxed());
        channel.expect_ack().times(1).returning(|_, _| Ok(()));

        let mut handler = MockMessageHandler::new();
        handler.expect_handle().times(1).returning(|_| Ok(()));

        EventConsumer::new(Arc::new(channel), Arc::new(handler), "url_created")
            .run(CancellationToken::new())
            .await;
    }
}
