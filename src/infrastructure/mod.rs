//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain and application
//! layers, providing concrete adapters for external systems.
//!
//! # Modules
//!
//! - [`cache`] - Caching abstractions (Redis, circuit-guarded and no-op implementations)
//! - [`metrics`] - Prometheus recorder behind the `metrics` macros
//! - [`messaging`] - Event channel (Redis Streams) and dead-letter sink contracts
//! - [`persistence`] - PostgreSQL repository and dead-letter implementations
//! - [`resilience`] - Circuit breaker and retry policies

pub mod cache;
pub mod messaging;
pub mod metrics;
pub mod persistence;
pub mod resilience;
