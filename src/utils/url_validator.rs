//! Long URL validation.

use url::Url;

/// Reason a long URL was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlValidationError {
    #[error("URL is not absolute or cannot be parsed: {0}")]
    Parse(String),

    #[error("unsupported scheme '{0}', expected http or https")]
    Scheme(String),

    #[error("URL has no host")]
    MissingHost,

    /// Control characters or leading/trailing whitespace. The stored string
    /// must be usable verbatim as a `Location` header value.
    #[error("URL contains control characters or surrounding whitespace")]
    UnsafeCharacters,
}

/// Checks that `long_url` is an absolute `http`/`https` URL with a non-empty host.
///
/// The input is only inspected; the caller keeps using the original string so
/// that code derivation sees exactly what the client sent.
pub fn validate_long_url(long_url: &str) -> Result<(), UrlValidationError> {
    if long_url.trim() != long_url || long_url.chars().any(|c| c.is_ascii_control()) {
        return Err(UrlValidationError::UnsafeCharacters);
    }

    let parsed = Url::parse(long_url).map_err(|e| UrlValidationError::Parse(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlValidationError::Scheme(other.to_string())),
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(UrlValidationError::MissingHost),
    }
}
