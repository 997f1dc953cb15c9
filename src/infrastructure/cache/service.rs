//! Cache service trait and error types.

use async_trait::async_trait;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    ConnectionError(String),

    #[error("cache operation error: {0}")]
    OperationError(String),

    #[error("cache unavailable: circuit open")]
    Unavailable,
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_dropped() || e.is_connection_refusal() || e.is_timeout() {
            Self::ConnectionError(e.to_string())
        } else {
            Self::OperationError(e.to_string())
        }
    }
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Key/value cache in front of the persistent store.
///
/// Implementations report failures as [`CacheError`]; callers on the read and
/// write paths treat any error as a miss or a skipped write.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache with TTL support
/// - [`crate::infrastructure::cache::GuardedCache`] - circuit-breaker decorator
/// - [`crate::infrastructure::cache::NullCache`] - no-op implementation for disabled caching
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Returns the long URL cached under `short_code`, if any.
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>>;

    /// Stores `long_url` under `short_code`, overwriting any previous value.
    ///
    /// `ttl_seconds = None` uses the implementation's default TTL.
    async fn set_url(
        &self,
        short_code: &str,
        long_url: &str,
        ttl_seconds: Option<u64>,
    ) -> CacheResult<()>;

    /// Checks if the cache backend is reachable.
    async fn health_check(&self) -> bool;
}
