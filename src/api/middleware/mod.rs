//! HTTP middleware and request extractors.

pub mod correlation;
pub mod tracing;
