//! Utility functions for code derivation and URL validation.
//!
//! - [`code_generator`] - Content-derived short code generation
//! - [`url_validator`] - Absolute http(s) URL validation

pub mod code_generator;
pub mod url_validator;
