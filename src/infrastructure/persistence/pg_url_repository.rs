//! PostgreSQL implementation of the URL mapping repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{InsertOutcome, UrlMapping};
use crate::domain::repositories::UrlRepository;
use crate::error::StorageError;

/// PostgreSQL repository for URL mappings.
///
/// Inserts rely on the `short_code` unique constraint: `ON CONFLICT DO NOTHING`
/// turns a lost race into [`InsertOutcome::AlreadyExists`] instead of an error.
pub struct PgUrlRepository {
    pool: Arc<PgPool>,
}

impl PgUrlRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UrlRepository for PgUrlRepository {
    async fn insert_if_absent(
        &self,
        short_code: &str,
        long_url: &str,
    ) -> Result<InsertOutcome, StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO url_mappings (short_code, long_url)
            VALUES ($1, $2)
            ON CONFLICT (short_code) DO NOTHING
            "#,
        )
        .bind(short_code)
        .bind(long_url)
        .execute(self.pool.as_ref())
        .await?;

        Ok(if result.rows_affected() == 0 {
            InsertOutcome::AlreadyExists
        } else {
            InsertOutcome::Inserted
        })
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Option<UrlMapping>, StorageError> {
        let row = sqlx::query_as::<_, (String, String, DateTime<Utc>)>(
            r#"
            SELECT short_code, long_url, created_at
            FROM url_mappings
            WHERE short_code = $1
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(|(short_code, long_url, created_at)| UrlMapping {
            short_code,
            long_url,
            created_at,
        }))
    }

    async fn find_code_by_long_url(&self, long_url: &str) -> Result<Option<String>, StorageError> {
        let code = sqlx::query_scalar::<_, String>(
            "SELECT short_code FROM url_mappings WHERE long_url = $1 LIMIT 1",
        )
        .bind(long_url)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(code)
    }

    async fn list_long_urls(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<(i64, String)>, StorageError> {
        let rows = sqlx::query_as::<_, (i64, String)>(
            r#"
            SELECT id, long_url
            FROM url_mappings
            WHERE id > $1
            ORDER BY id
            LIMIT $2
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}
