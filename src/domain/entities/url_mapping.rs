//! URL mapping entity.

use chrono::{DateTime, Utc};

/// A stored mapping between a short code and its long URL.
///
/// `short_code` is unique and derived from `long_url`; both are immutable once
/// stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMapping {
    pub short_code: String,
    pub long_url: String,
    pub created_at: DateTime<Utc>,
}

impl UrlMapping {
    /// Creates a new UrlMapping instance.
    pub fn new(short_code: String, long_url: String, created_at: DateTime<Utc>) -> Self {
        Self {
            short_code,
            long_url,
            created_at,
        }
    }
}

/// Result of a conditional insert into the store.
///
/// `AlreadyExists` is the store's uniqueness signal; it is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}
