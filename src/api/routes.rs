//! API route configuration.

use crate::api::handlers::{
    health_handler, metrics_handler, redirect_handler, shorten_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Public routes of the service.
///
/// # Endpoints
///
/// - `POST /shorten` - Create (or look up) the short URL for a long URL
/// - `GET  /health`  - Component health checks
/// - `GET  /metrics` - Prometheus scrape endpoint
/// - `GET  /{code}`  - Permanent redirect to the long URL
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/shorten", post(shorten_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/{code}", get(redirect_handler))
}
