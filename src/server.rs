//! HTTP server initialization and runtime setup.
//!
//! Wires the database pool, cache, event channel, publisher, membership guard
//! and consumer together, then runs the Axum server until a shutdown signal.

use crate::application::messaging::{
    BackgroundDispatcher, EventConsumer, EventDispatcher, ResilientPublisher, UrlEventHandler,
};
use crate::application::services::ShortenerService;
use crate::config::Config;
use crate::domain::membership_guard::MembershipGuard;
use crate::domain::repositories::UrlRepository;
use crate::infrastructure::cache::{CacheService, GuardedCache, NullCache, RedisCache};
use crate::infrastructure::messaging::{DeadLetterSink, MessageChannel, RedisStreamChannel};
use crate::infrastructure::metrics;
use crate::infrastructure::persistence::{PgDeadLetterSink, PgUrlRepository};
use crate::infrastructure::resilience::CircuitBreaker;
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

const METRICS_UPKEEP_SECS: u64 = 5;

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Prometheus recorder for `/metrics`
/// - PostgreSQL connection pool and migrations
/// - Redis cache behind a circuit breaker (or NullCache fallback)
/// - Redis Streams channel, connected with back-off
/// - Resilient event publisher with dead-letter fallback
/// - Membership guard, optionally seeded from the store
/// - Event consumer
/// - Axum HTTP server
///
/// On shutdown, background publishes and the consumer are cancelled and
/// awaited before returning.
///
/// # Errors
///
/// Returns an error if:
/// - A metrics recorder is already installed
/// - Database connection or migration fails
/// - The event channel cannot be reached after all connection attempts
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let metrics_handle = metrics::install().context("Failed to install metrics recorder")?;

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .idle_timeout(Duration::from_secs(config.db_idle_timeout))
        .max_lifetime(Duration::from_secs(config.db_max_lifetime))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    tracker.spawn(metrics::run_upkeep(
        metrics_handle.clone(),
        Duration::from_secs(METRICS_UPKEEP_SECS),
        shutdown.clone(),
    ));

    let cache = build_cache(&config).await;

    let channel = RedisStreamChannel::connect(&config.redis_url, config.stream_config(), &shutdown)
        .await
        .context("Failed to connect to event channel")?;
    let channel: Arc<dyn MessageChannel> = Arc::new(channel);
    tracing::info!(topic = %config.url_created_topic, "Event channel connected");

    let pool = Arc::new(pool);
    let repository: Arc<dyn UrlRepository> = Arc::new(PgUrlRepository::new(pool.clone()));
    let dead_letters: Arc<dyn DeadLetterSink> = Arc::new(PgDeadLetterSink::new(pool));

    let channel_breaker = Arc::new(CircuitBreaker::new(
        "event_channel",
        config.breaker_config(),
    ));
    let publisher = Arc::new(ResilientPublisher::new(
        channel.clone(),
        dead_letters,
        channel_breaker.clone(),
        config.url_created_topic.clone(),
        shutdown.clone(),
    ));
    let events: Arc<dyn EventDispatcher> =
        Arc::new(BackgroundDispatcher::new(publisher, tracker.clone()));

    let guard = Arc::new(MembershipGuard::new(config.guard_config())?);

    let shortener = Arc::new(
        ShortenerService::new(repository, cache, guard, events)
            .with_cache_ttl(config.cache_ttl_seconds),
    );

    if config.bloom_seed_on_startup {
        shortener
            .seed_guard()
            .await
            .context("Failed to seed membership guard")?;
    }

    if config.consumer_enabled {
        let consumer = EventConsumer::new(
            channel,
            Arc::new(UrlEventHandler),
            config.url_created_topic.clone(),
        );
        tracker.spawn(consumer.run(shutdown.clone()));
        tracing::info!("Event consumer started");
    }

    let state = AppState::new(
        shortener,
        channel_breaker,
        metrics_handle,
        config.base_url.clone(),
    );
    let app = app_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutting down background tasks");
    shutdown.cancel();
    tracker.close();
    tracker.wait().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Builds the cache adapter, falling back to [`NullCache`] when caching is
/// disabled or Redis is unreachable at startup.
async fn build_cache(config: &Config) -> Arc<dyn CacheService> {
    if !config.cache_enabled {
        tracing::info!("Cache disabled (NullCache)");
        return Arc::new(NullCache::new());
    }

    match RedisCache::connect(&config.redis_url, config.cache_ttl_seconds).await {
        Ok(redis) => {
            tracing::info!("Cache enabled (Redis)");
            let breaker = Arc::new(CircuitBreaker::new("cache", config.breaker_config()));
            Arc::new(GuardedCache::new(Arc::new(redis), breaker))
        }
        Err(e) => {
            tracing::warn!("Failed to connect to Redis: {}. Using NullCache.", e);
            Arc::new(NullCache::new())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
