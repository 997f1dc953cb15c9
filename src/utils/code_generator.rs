//! Short code derivation.
//!
//! Codes are content-derived: the same long URL always maps to the same code,
//! which lets the store's unique constraint on `short_code` make concurrent
//! creation of one URL idempotent.

use sha2::{Digest, Sha256};

/// Number of hex characters of the digest used as the short code.
pub const CODE_LENGTH: usize = 7;

/// Derives the short code for a long URL.
///
/// Returns the first [`CODE_LENGTH`] lowercase hex characters of the SHA-256
/// digest of the URL bytes. The URL is hashed exactly as given, without
/// normalization.
///
/// # Examples
///
/// ```ignore
/// let code = derive_code("https://example.com/a");
/// assert_eq!(code.len(), 7);
/// assert_eq!(code, derive_code("https://example.com/a"));
/// ```
pub fn derive_code(long_url: &str) -> String {
    let digest = Sha256::digest(long_url.as_bytes());
    let mut code = hex::encode(digest);
    code.truncate(CODE_LENGTH);
    code
}
