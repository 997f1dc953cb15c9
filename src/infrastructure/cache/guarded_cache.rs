//! Circuit-breaker decorator for a [`CacheService`].

use super::service::{CacheError, CacheResult, CacheService};
use crate::infrastructure::resilience::{CircuitBreaker, CircuitBreakerError, CircuitState};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Wraps a cache backend with its own circuit breaker.
///
/// While the circuit is open, calls fail fast with [`CacheError::Unavailable`]
/// instead of waiting on a dead backend. Callers treat that like any other
/// cache error: a miss on reads and a skipped write.
pub struct GuardedCache {
    inner: Arc<dyn CacheService>,
    breaker: Arc<CircuitBreaker>,
}

impl GuardedCache {
    pub fn new(inner: Arc<dyn CacheService>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { inner, breaker }
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }
}

fn flatten(e: CircuitBreakerError<CacheError>) -> CacheError {
    match e {
        CircuitBreakerError::Open(open) => {
            debug!(dependency = open.name, "Cache call short-circuited");
            CacheError::Unavailable
        }
        CircuitBreakerError::Inner(e) => e,
    }
}

#[async_trait]
impl CacheService for GuardedCache {
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>> {
        self.breaker
            .call(self.inner.get_url(short_code))
            .await
            .map_err(flatten)
    }

    async fn set_url(
        &self,
        short_code: &str,
        long_url: &str,
        ttl_seconds: Option<u64>,
    ) -> CacheResult<()> {
        self.breaker
            .call(self.inner.set_url(short_code, long_url, ttl_seconds))
            .await
            .map_err(flatten)
    }

    async fn health_check(&self) -> bool {
        self.breaker.state() != CircuitState::Open && self.inner.health_check().await
    }
}
