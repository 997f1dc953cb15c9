//! Handler for link shortening endpoint.

use axum::{Json, extract::State};
use validator::Validate;

use crate::api::dto::shorten::{ShortenRequest, ShortenResponse};
use crate::api::middleware::correlation::CorrelationId;
use crate::error::AppError;
use crate::state::AppState;

/// Creates (or returns the existing) short URL for a long URL.
///
/// # Endpoint
///
/// `POST /shorten`
///
/// # Request Body
///
/// ```json
/// { "longUrl": "https://example.com/some/long/path" }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "shortUrl": "http://localhost:8080/3f1b2c4",
///   "shortCode": "3f1b2c4",
///   "created": true
/// }
/// ```
///
/// # Errors
///
/// - 400 Bad Request - missing or invalid URL
/// - 409 Conflict - the derived code already belongs to another URL
/// - 500 Internal Server Error - store failure
pub async fn shorten_handler(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    Json(payload): Json<ShortenRequest>,
) -> Result<Json<ShortenResponse>, AppError> {
    payload.validate()?;

    let outcome = state
        .shortener
        .create(&payload.long_url, Some(&correlation_id))
        .await?;

    Ok(Json(ShortenResponse {
        short_url: state.short_url(&outcome.short_code),
        short_code: outcome.short_code,
        created: outcome.created,
    }))
}
