//! PostgreSQL implementations.
//!
//! Queries are built at runtime with `sqlx::query`/`query_as`, so the crate
//! builds without a live database.
//!
//! - [`PgUrlRepository`] - URL mapping storage and retrieval
//! - [`PgDeadLetterSink`] - durable fallback for undeliverable events

pub mod pg_dead_letter_sink;
pub mod pg_url_repository;

pub use pg_dead_letter_sink::PgDeadLetterSink;
pub use pg_url_repository::PgUrlRepository;
