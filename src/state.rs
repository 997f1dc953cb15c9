//! Shared application state injected into HTTP handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::application::services::ShortenerService;
use crate::domain::repositories::UrlRepository;
use crate::infrastructure::resilience::CircuitBreaker;

#[derive(Clone)]
pub struct AppState {
    pub shortener: Arc<ShortenerService<dyn UrlRepository>>,
    /// Breaker guarding the event channel; reported by `/health`.
    pub channel_breaker: Arc<CircuitBreaker>,
    /// Renders the Prometheus exposition for `/metrics`.
    pub metrics: PrometheusHandle,
    /// Prefix for short URLs returned to clients.
    pub base_url: String,
}

impl AppState {
    pub fn new(
        shortener: Arc<ShortenerService<dyn UrlRepository>>,
        channel_breaker: Arc<CircuitBreaker>,
        metrics: PrometheusHandle,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            shortener,
            channel_breaker,
            metrics,
            base_url: base_url.into(),
        }
    }

    /// Joins the base URL and a short code.
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), short_code)
    }
}
