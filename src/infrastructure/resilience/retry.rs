//! Bounded retry with exponential back-off.
//!
//! [`RetryPolicy::run`] retries an operation while its error is transient,
//! sleeping between attempts according to the policy. It stops early on a
//! non-transient error and aborts without further attempts when the
//! cancellation token fires.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::ExponentialBackoff;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Classifies errors that are worth retrying.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Outcome of a retry sequence that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// An attempt failed with an error that is not worth retrying.
    #[error("non-retryable failure: {0}")]
    Permanent(#[source] E),

    /// The cancellation token fired before the sequence finished.
    #[error("cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Retry policy: attempt count and back-off shape.
///
/// The delay before retry `n` (1-based) is `base_delay * 2^(n-1)`, plus a
/// uniform random jitter in `[0, jitter)`, capped at `max_delay`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Channel send: 3 attempts, 1s base, 10s cap.
    pub fn channel_send() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10))
    }

    /// Dead-letter append: 3 attempts, 1s base, 5s cap.
    pub fn dead_letter_append() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(5))
    }

    /// Channel connection at startup: 5 attempts, `2^attempt` seconds plus up
    /// to 1s of jitter, 10s cap.
    pub fn channel_connect() -> Self {
        Self::new(5, Duration::from_secs(2), Duration::from_secs(10))
            .with_jitter(Duration::from_secs(1))
    }

    /// Delays slept between consecutive attempts (`max_attempts - 1` values).
    pub fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let half_base_ms = (self.base_delay.as_millis() as u64 / 2).max(1);
        let max_delay = self.max_delay;
        let jitter = self.jitter;

        ExponentialBackoff::from_millis(2)
            .factor(half_base_ms)
            .max_delay(max_delay)
            .map(move |delay| {
                if jitter.is_zero() {
                    delay
                } else {
                    let extra = rand::rng().random_range(0.0..jitter.as_secs_f64());
                    (delay + Duration::from_secs_f64(extra)).min(max_delay)
                }
            })
            .take(self.max_attempts.saturating_sub(1) as usize)
    }

    /// Runs `operation` until it succeeds, fails permanently, runs out of
    /// attempts, or `cancel` fires.
    ///
    /// `name` labels the log lines emitted for failed attempts.
    pub async fn run<F, Fut, T, E>(
        &self,
        name: &'static str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let attempts = AtomicU32::new(0);
        let max_attempts = self.max_attempts;

        let action = || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let fut = operation();
            async move {
                let result = fut.await;
                if let Err(e) = &result {
                    warn!(
                        operation = name,
                        attempt,
                        max_attempts,
                        transient = e.is_transient(),
                        error = %e,
                        "Attempt failed"
                    );
                }
                result
            }
        };

        let retry = RetryIf::spawn(self.delays(), action, |e: &E| e.is_transient());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let attempts = attempts.load(Ordering::SeqCst);
                debug!(operation = name, attempts, "Retry sequence cancelled");
                return Err(RetryError::Cancelled { attempts });
            }
            result = retry => result,
        };

        let attempts = attempts.load(Ordering::SeqCst);
        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_transient() => Err(RetryError::Exhausted {
                attempts,
                source: e,
            }),
            Err(e) => Err(RetryError::Permanent(e)),
        }
    }
}
