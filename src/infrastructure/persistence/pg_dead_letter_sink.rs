//! PostgreSQL-backed dead-letter sink.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use std::sync::Arc;

use crate::domain::entities::DeadLetterEntry;
use crate::infrastructure::messaging::{DeadLetterError, DeadLetterSink};

/// Appends undeliverable events to the `dead_letter_events` table.
pub struct PgDeadLetterSink {
    pool: Arc<PgPool>,
}

impl PgDeadLetterSink {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterSink for PgDeadLetterSink {
    async fn append(&self, entry: &DeadLetterEntry) -> Result<(), DeadLetterError> {
        let payload: serde_json::Value = serde_json::from_str(&entry.payload)
            .unwrap_or_else(|_| serde_json::Value::String(entry.payload.clone()));

        sqlx::query(
            r#"
            INSERT INTO dead_letter_events (topic, payload, reason, failed_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&entry.topic)
        .bind(Json(payload))
        .bind(&entry.reason)
        .bind(entry.failed_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
