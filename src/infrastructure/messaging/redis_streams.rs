//! Redis Streams implementation of [`MessageChannel`].
//!
//! Each topic is a stream key. Producers `XADD` a single `payload` field;
//! consumers read through a consumer group with `XREADGROUP` and acknowledge
//! with `XACK`, so unacknowledged messages stay in the group's pending list.

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use redis::streams::StreamReadReply;
use redis::{AsyncCommands, Client, Value, aio::ConnectionManager};
use std::collections::VecDeque;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::channel::{ChannelError, Delivery, MessageChannel};
use crate::infrastructure::resilience::{RetryError, RetryPolicy};

const PAYLOAD_FIELD: &str = "payload";

/// Consumer-group settings for [`RedisStreamChannel`].
#[derive(Debug, Clone)]
pub struct StreamChannelConfig {
    pub group: String,
    pub consumer_name: String,
    /// Maximum entries fetched per `XREADGROUP`.
    pub batch_size: usize,
    /// Sleep between polls of an empty stream.
    pub poll_interval: Duration,
}

impl Default for StreamChannelConfig {
    fn default() -> Self {
        Self {
            group: "url_shortener_group".to_string(),
            consumer_name: "shortener-1".to_string(),
            batch_size: 10,
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Message channel backed by Redis Streams.
///
/// Holds separate producer and consumer connections so that a slow consumer
/// poll never queues behind publishes.
pub struct RedisStreamChannel {
    producer: ConnectionManager,
    consumer: ConnectionManager,
    config: StreamChannelConfig,
}

impl RedisStreamChannel {
    /// Connects both ends, retrying with [`RetryPolicy::channel_connect`].
    ///
    /// # Errors
    ///
    /// - [`RetryError::Permanent`] for an unparsable URL
    /// - [`RetryError::Exhausted`] when Redis stays unreachable for every attempt
    /// - [`RetryError::Cancelled`] when `cancel` fires during the attempts
    pub async fn connect(
        redis_url: &str,
        config: StreamChannelConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, RetryError<ChannelError>> {
        let client = Client::open(redis_url)
            .map_err(|e| RetryError::Permanent(ChannelError::Config(e.to_string())))?;

        let (producer, consumer) = RetryPolicy::channel_connect()
            .run("channel_connect", cancel, || {
                let client = client.clone();
                async move {
                    let mut producer = ConnectionManager::new(client.clone()).await?;
                    producer.ping::<()>().await?;
                    let consumer = ConnectionManager::new(client).await?;
                    Ok::<_, ChannelError>((producer, consumer))
                }
            })
            .await?;

        info!(
            group = %config.group,
            consumer = %config.consumer_name,
            "Connected to Redis Streams"
        );

        Ok(Self {
            producer,
            consumer,
            config,
        })
    }
}

#[async_trait]
impl MessageChannel for RedisStreamChannel {
    async fn send(&self, topic: &str, payload: &[u8]) -> Result<(), ChannelError> {
        let mut conn = self.producer.clone();
        let id: String = conn.xadd(topic, "*", &[(PAYLOAD_FIELD, payload)]).await?;
        debug!(topic, id = %id, "Message appended");
        Ok(())
    }

    fn consume(&self, topic: &str) -> BoxStream<'static, Result<Delivery, ChannelError>> {
        let state = ConsumeState {
            conn: self.consumer.clone(),
            topic: topic.to_string(),
            config: self.config.clone(),
            group_ready: false,
            pending: VecDeque::new(),
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(delivery) = state.pending.pop_front() {
                    return Some((delivery, state));
                }

                if !state.group_ready {
                    if let Err(e) = state.ensure_group().await {
                        return Some((Err(e), state));
                    }
                    state.group_ready = true;
                }

                match state.read_batch().await {
                    Ok(0) => tokio::time::sleep(state.config.poll_interval).await,
                    Ok(_) => {}
                    Err(e) => return Some((Err(e), state)),
                }
            }
        })
        .boxed()
    }

    async fn ack(&self, topic: &str, delivery_id: &str) -> Result<(), ChannelError> {
        let mut conn = self.consumer.clone();
        let _: i64 = conn
            .xack(topic, &self.config.group, &[delivery_id])
            .await?;
        Ok(())
    }
}

struct ConsumeState {
    conn: ConnectionManager,
    topic: String,
    config: StreamChannelConfig,
    group_ready: bool,
    pending: VecDeque<Result<Delivery, ChannelError>>,
}

impl ConsumeState {
    /// Creates the consumer group (and the stream) if missing.
    async fn ensure_group(&mut self) -> Result<(), ChannelError> {
        let result: redis::RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.topic)
            .arg(&self.config.group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut self.conn)
            .await;

        match result {
            Ok(()) => {
                info!(topic = %self.topic, group = %self.config.group, "Consumer group created");
                Ok(())
            }
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads the next batch into `pending`, returning how many entries arrived.
    async fn read_batch(&mut self) -> Result<usize, ChannelError> {
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.group)
            .arg(&self.config.consumer_name)
            .arg("COUNT")
            .arg(self.config.batch_size)
            .arg("STREAMS")
            .arg(&self.topic)
            .arg(">")
            .query_async(&mut self.conn)
            .await?;

        let Some(reply) = reply else {
            return Ok(0);
        };

        let mut count = 0;
        for key in reply.keys {
            for entry in key.ids {
                count += 1;
                let delivery = match entry.map.get(PAYLOAD_FIELD) {
                    Some(Value::BulkString(bytes)) => Ok(Delivery {
                        id: entry.id,
                        payload: bytes.clone(),
                    }),
                    Some(Value::SimpleString(s)) => Ok(Delivery {
                        id: entry.id,
                        payload: s.clone().into_bytes(),
                    }),
                    _ => Err(ChannelError::Malformed {
                        id: entry.id,
                        reason: format!("missing '{}' field", PAYLOAD_FIELD),
                    }),
                };
                self.pending.push_back(delivery);
            }
        }

        Ok(count)
    }
}
