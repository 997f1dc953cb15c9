//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;

use crate::api::middleware::correlation::CorrelationId;
use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its long URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// Responds with `301 Moved Permanently`. Lookups go through the cache first
/// and fall back to the store; see
/// [`crate::application::services::ShortenerService::resolve`].
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist.
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
) -> Result<impl IntoResponse, AppError> {
    let long_url = state
        .shortener
        .resolve(&code, Some(&correlation_id))
        .await?
        .ok_or_else(|| AppError::not_found("Short URL not found", json!({ "code": code })))?;

    Ok((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, long_url)]))
}
