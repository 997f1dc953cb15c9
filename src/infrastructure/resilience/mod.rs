//! Fault-tolerance primitives shared by the cache and messaging adapters.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitOpen, CircuitState, Permit,
};
pub use retry::{RetryError, RetryPolicy, Transient};
