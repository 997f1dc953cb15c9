//! Resilient publication of domain events.
//!
//! [`ResilientPublisher::publish`] composes three policies around the channel:
//!
//! 1. the channel circuit breaker decides whether a send is attempted at all;
//! 2. a retry policy drives the send itself, and only the final outcome of the
//!    whole retry sequence is reported to the breaker;
//! 3. events that were not delivered go to the dead-letter sink, and are
//!    dropped with an error log if even that fails.
//!
//! Shutdown stops both retry sequences. An event whose send was cut short is
//! still offered to the dead-letter sink once; every event that ends up in
//! neither place is counted in `url_events_dropped_total`.
//!
//! Publication never reports an error to the caller.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::domain::entities::DeadLetterEntry;
use crate::domain::events::UrlCreatedEvent;
use crate::infrastructure::messaging::{DeadLetterSink, MessageChannel};
use crate::infrastructure::resilience::{CircuitBreaker, RetryError, RetryPolicy};

/// Terminal state of one publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    DeadLettered,
    /// Neither the channel nor the dead-letter sink accepted the event.
    Dropped,
    /// Shutdown interrupted the dead-letter retries before the event was parked.
    Abandoned,
}

pub struct ResilientPublisher {
    channel: Arc<dyn MessageChannel>,
    dead_letters: Arc<dyn DeadLetterSink>,
    breaker: Arc<CircuitBreaker>,
    topic: String,
    send_policy: RetryPolicy,
    dead_letter_policy: RetryPolicy,
    shutdown: CancellationToken,
}

impl ResilientPublisher {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        dead_letters: Arc<dyn DeadLetterSink>,
        breaker: Arc<CircuitBreaker>,
        topic: impl Into<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            channel,
            dead_letters,
            breaker,
            topic: topic.into(),
            send_policy: RetryPolicy::channel_send(),
            dead_letter_policy: RetryPolicy::dead_letter_append(),
            shutdown,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn publish(&self, event: &UrlCreatedEvent) -> PublishOutcome {
        let payload = match event.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!(short_code = %event.short_code, error = %e, "Event could not be serialized - dropped");
                self.record_drop("serialization");
                return PublishOutcome::Dropped;
            }
        };

        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(open) => {
                warn!(
                    topic = %self.topic,
                    short_code = %event.short_code,
                    retry_in_ms = open.retry_in.as_millis() as u64,
                    "Channel circuit open - routing event to dead-letter sink"
                );
                metrics::counter!(
                    "url_events_publish_failures_total",
                    "topic" => self.topic.clone(),
                    "reason" => "circuit_open"
                )
                .increment(1);
                return self.dead_letter(event, payload, open.to_string()).await;
            }
        };

        let started = Instant::now();
        let result = self
            .send_policy
            .run("channel_send", &self.shutdown, || {
                self.channel.send(&self.topic, payload.as_bytes())
            })
            .await;

        match result {
            Ok(()) => {
                permit.succeeded();
                metrics::histogram!("url_events_publish_latency_seconds", "topic" => self.topic.clone())
                    .record(started.elapsed().as_secs_f64());
                metrics::counter!("url_events_published_total", "topic" => self.topic.clone())
                    .increment(1);
                debug!(topic = %self.topic, short_code = %event.short_code, "Event delivered");
                PublishOutcome::Delivered
            }
            Err(RetryError::Cancelled { attempts }) => {
                drop(permit);
                warn!(
                    topic = %self.topic,
                    short_code = %event.short_code,
                    correlation_id = ?event.correlation_id,
                    attempts,
                    "Publish abandoned: shutdown in progress - parking event"
                );
                metrics::counter!(
                    "url_events_publish_failures_total",
                    "topic" => self.topic.clone(),
                    "reason" => "abandoned"
                )
                .increment(1);
                let reason = format!("publish abandoned at shutdown after {attempts} attempts");
                self.dead_letter(event, payload, reason).await
            }
            Err(e) => {
                permit.failed();
                metrics::counter!(
                    "url_events_publish_failures_total",
                    "topic" => self.topic.clone(),
                    "reason" => "send_failed"
                )
                .increment(1);
                warn!(
                    topic = %self.topic,
                    short_code = %event.short_code,
                    error = %e,
                    "Event not delivered - routing to dead-letter sink"
                );
                self.dead_letter(event, payload, e.to_string()).await
            }
        }
    }

    async fn dead_letter(
        &self,
        event: &UrlCreatedEvent,
        payload: String,
        reason: String,
    ) -> PublishOutcome {
        let entry = DeadLetterEntry::new(self.topic.as_str(), payload, reason);

        let result = match self
            .dead_letter_policy
            .run("dead_letter_append", &self.shutdown, || {
                self.dead_letters.append(&entry)
            })
            .await
        {
            // Shutdown had already begun: one attempt, no retries.
            Err(RetryError::Cancelled { attempts: 0 }) => self
                .dead_letters
                .append(&entry)
                .await
                .map_err(|source| RetryError::Exhausted {
                    attempts: 1,
                    source,
                }),
            other => other,
        };

        match result {
            Ok(()) => {
                metrics::counter!("url_events_dead_lettered_total", "topic" => self.topic.clone())
                    .increment(1);
                warn!(
                    topic = %self.topic,
                    short_code = %event.short_code,
                    "Event stored in dead-letter sink"
                );
                PublishOutcome::DeadLettered
            }
            Err(RetryError::Cancelled { attempts }) => {
                self.record_drop("abandoned");
                error!(
                    topic = %self.topic,
                    short_code = %event.short_code,
                    long_url = %event.long_url,
                    correlation_id = ?event.correlation_id,
                    attempts,
                    "Event DROPPED: dead-letter append abandoned at shutdown"
                );
                PublishOutcome::Abandoned
            }
            Err(e) => {
                self.record_drop("dead_letter_failed");
                error!(
                    topic = %self.topic,
                    short_code = %event.short_code,
                    long_url = %event.long_url,
                    correlation_id = ?event.correlation_id,
                    error = %e,
                    "Event DROPPED: dead-letter sink unavailable"
                );
                PublishOutcome::Dropped
            }
        }
    }

    fn record_drop(&self, reason: &'static str) {
        metrics::counter!(
            "url_events_dropped_total",
            "topic" => self.topic.clone(),
            "reason" => reason
        )
        .increment(1);
    }
}

/// Hands events off for publication without waiting for the outcome.
#[cfg_attr(test, mockall::automock)]
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, event: UrlCreatedEvent);
}

/// Publishes each event on its own task registered with a [`TaskTracker`].
///
/// Shutdown closes the tracker and waits on it, so in-flight publishes
/// finish (or are abandoned through the publisher's cancellation token)
/// before the process exits.
pub struct BackgroundDispatcher {
    publisher: Arc<ResilientPublisher>,
    tracker: TaskTracker,
}

impl BackgroundDispatcher {
    pub fn new(publisher: Arc<ResilientPublisher>, tracker: TaskTracker) -> Self {
        Self { publisher, tracker }
    }
}

impl EventDispatcher for BackgroundDispatcher {
    fn dispatch(&self, event: UrlCreatedEvent) {
        let publisher = self.publisher.clone();
        let span = info_span!(
            "publish",
            topic = %publisher.topic(),
            short_code = %event.short_code,
            correlation_id = ?event.correlation_id,
        );

        self.tracker.spawn(
            async move {
                publisher.publish(&event).await;
            }
            .instrument(span),
        );
    }
}
