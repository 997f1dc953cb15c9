//! Domain layer containing business entities and logic.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`events`] - Events announced to downstream consumers
//! - [`membership_guard`] - Bloom filter of accepted long URLs
//!
//! The domain layer has no dependencies on infrastructure or presentation
//! layers; repository traits define contracts implemented by infrastructure.

pub mod entities;
pub mod events;
pub mod membership_guard;
pub mod repositories;
