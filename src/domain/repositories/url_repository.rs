//! Repository trait for URL mapping data access.

use crate::domain::entities::{InsertOutcome, UrlMapping};
use crate::error::StorageError;
use async_trait::async_trait;

/// Repository interface for the persistent code ↔ URL mapping.
///
/// The store enforces uniqueness of `short_code`; that constraint is the only
/// cross-request consistency mechanism for concurrent creation.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgUrlRepository`] - PostgreSQL implementation
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRepository: Send + Sync {
    /// Inserts the mapping unless `short_code` already exists.
    ///
    /// # Returns
    ///
    /// - `Ok(InsertOutcome::Inserted)` if a row was written
    /// - `Ok(InsertOutcome::AlreadyExists)` if the code is already taken
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on any other database failure.
    async fn insert_if_absent(
        &self,
        short_code: &str,
        long_url: &str,
    ) -> Result<InsertOutcome, StorageError>;

    /// Finds a mapping by its short code.
    async fn find_by_code(&self, short_code: &str) -> Result<Option<UrlMapping>, StorageError>;

    /// Finds the short code already assigned to a long URL.
    async fn find_code_by_long_url(&self, long_url: &str) -> Result<Option<String>, StorageError>;

    /// Lists stored long URLs in insertion order, starting after row `after_id`.
    ///
    /// Returns `(row_id, long_url)` pairs; used to seed the membership guard.
    async fn list_long_urls(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<(i64, String)>, StorageError>;

    /// Checks that the store answers queries.
    async fn ping(&self) -> Result<(), StorageError>;
}
