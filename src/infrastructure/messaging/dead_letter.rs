//! Dead-letter sink abstraction.

use async_trait::async_trait;

use crate::domain::entities::DeadLetterEntry;
use crate::infrastructure::resilience::Transient;

#[derive(Debug, thiserror::Error)]
pub enum DeadLetterError {
    #[error("dead-letter store error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("dead-letter sink unavailable: {0}")]
    Unavailable(String),
}

impl Transient for DeadLetterError {
    fn is_transient(&self) -> bool {
        match self {
            DeadLetterError::Storage(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
            ),
            DeadLetterError::Unavailable(_) => true,
        }
    }
}

/// Durable fallback for events the channel could not accept.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn append(&self, entry: &DeadLetterEntry) -> Result<(), DeadLetterError>;
}
