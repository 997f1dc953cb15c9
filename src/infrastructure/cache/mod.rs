//! Caching layer for fast redirect lookups.
//!
//! Provides a [`CacheService`] trait with these implementations:
//! - [`RedisCache`] - Production Redis-backed cache
//! - [`GuardedCache`] - Circuit-breaker wrapper that fails fast while Redis is down
//! - [`NullCache`] - No-op implementation for disabled caching

mod guarded_cache;
mod null_cache;
mod redis_cache;
mod service;

pub use guarded_cache::GuardedCache;
pub use null_cache::NullCache;
pub use redis_cache::{KEY_PREFIX, RedisCache};
pub use service::{CacheError, CacheResult, CacheService};

#[cfg(test)]
pub use service::MockCacheService;
