//! Handlers for messages received from the events topic.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::events::{InboundEvent, URL_CREATED};

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("undecodable message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Processes the payload of one consumed message.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError>;
}

/// Records `URL_CREATED` notifications and ignores other event types.
#[derive(Debug, Default)]
pub struct UrlEventHandler;

#[async_trait]
impl MessageHandler for UrlEventHandler {
    async fn handle(&self, payload: &[u8]) -> Result<(), HandlerError> {
        let event: InboundEvent = serde_json::from_slice(payload)?;

        if event.event == URL_CREATED {
            info!(
                event = %event.event,
                short_code = ?event.short_code,
                long_url = ?event.long_url,
                correlation_id = ?event.correlation_id,
                "URL_CREATED event processed"
            );
            metrics::counter!("url_events_consumed_total", "event" => URL_CREATED).increment(1);
        } else {
            debug!(event = %event.event, "Ignoring unknown event type");
        }

        Ok(())
    }
}
