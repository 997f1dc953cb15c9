//! Request correlation ids.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;
use uuid::Uuid;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Correlation id of the current request.
///
/// Taken from the `X-Correlation-ID` header when present and non-empty,
/// otherwise a fresh UUID v4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Self(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> CorrelationId {
        let (mut parts, _) = request.into_parts();
        CorrelationId::from_request_parts(&mut parts, &())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_uses_header_value() {
        let request = Request::builder()
            .header("X-Correlation-ID", "req-42")
            .body(())
            .unwrap();

        assert_eq!(extract(request).await, CorrelationId("req-42".to_string()));
    }

    #[tokio::test]
    async fn test_generates_uuid_when_missing_or_blank() {
        let missing = extract(Request::builder().body(()).unwrap()).await;
        assert!(Uuid::parse_str(&missing.0).is_ok());

        let blank = extract(
            Request::builder()
                .header("X-Correlation-ID", "  ")
                .body(())
                .unwrap(),
        )
        .await;
        assert!(Uuid::parse_str(&blank.0).is_ok());
    }
}
