//! Application layer implementing the shortening use cases.
//!
//! This layer orchestrates domain operations by coordinating repository,
//! cache and messaging calls. Services consume traits and provide a clean API
//! for HTTP handlers.
//!
//! # Modules
//!
//! - [`services`] - [`services::ShortenerService`] for create and resolve
//! - [`messaging`] - resilient event publication and the event consumer loop

pub mod messaging;
pub mod services;
