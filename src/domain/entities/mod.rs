//! Core domain entities representing the business data model.
//!
//! # Entity Types
//!
//! - [`UrlMapping`] - A stored short code to long URL mapping
//! - [`InsertOutcome`] - Result of a conditional insert into the store
//! - [`DeadLetterEntry`] - An event that could not be delivered to the channel

pub mod dead_letter;
pub mod url_mapping;

pub use dead_letter::DeadLetterEntry;
pub use url_mapping::{InsertOutcome, UrlMapping};
