//! URL shortening and resolution service.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::application::messaging::EventDispatcher;
use crate::domain::entities::InsertOutcome;
use crate::domain::events::UrlCreatedEvent;
use crate::domain::membership_guard::MembershipGuard;
use crate::domain::repositories::UrlRepository;
use crate::error::ShortenerError;
use crate::infrastructure::cache::CacheService;
use crate::utils::code_generator::derive_code;
use crate::utils::url_validator::validate_long_url;

/// TTL applied to cache entries written by the service.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;

const SEED_PAGE_SIZE: i64 = 1000;

/// Result of [`ShortenerService::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenOutcome {
    pub short_code: String,
    /// `true` only for the call that inserted the mapping.
    pub created: bool,
}

/// Orchestrates the store, cache, membership guard and event publication.
///
/// # Create
///
/// 1. Validate the long URL (no side effects on failure).
/// 2. If the guard has seen the URL, look its code up in the store and return
///    it. A miss there is a guard false positive and falls through.
/// 3. Derive the code and insert with the store's uniqueness constraint
///    deciding races. Only the winning insert populates the cache, updates the
///    guard and announces the mapping.
///
/// # Resolve
///
/// Cache first; on a miss or cache error the store is read and the cache is
/// refilled on a detached task.
pub struct ShortenerService<R: UrlRepository + ?Sized> {
    repository: Arc<R>,
    cache: Arc<dyn CacheService>,
    guard: Arc<MembershipGuard>,
    events: Arc<dyn EventDispatcher>,
    cache_ttl_seconds: u64,
}

impl<R: UrlRepository + ?Sized> ShortenerService<R> {
    pub fn new(
        repository: Arc<R>,
        cache: Arc<dyn CacheService>,
        guard: Arc<MembershipGuard>,
        events: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            repository,
            cache,
            guard,
            events,
            cache_ttl_seconds: DEFAULT_CACHE_TTL_SECONDS,
        }
    }

    pub fn with_cache_ttl(mut self, ttl_seconds: u64) -> Self {
        self.cache_ttl_seconds = ttl_seconds;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn cache(&self) -> &Arc<dyn CacheService> {
        &self.cache
    }

    /// Returns the short code for `long_url`, creating the mapping if needed.
    ///
    /// # Errors
    ///
    /// - [`ShortenerError::InvalidUrl`] - not an absolute http(s) URL with a host
    /// - [`ShortenerError::CodeCollision`] - the derived code belongs to another URL
    /// - [`ShortenerError::Storage`] - the store failed; nothing is retried
    pub async fn create(
        &self,
        long_url: &str,
        correlation_id: Option<&str>,
    ) -> Result<ShortenOutcome, ShortenerError> {
        validate_long_url(long_url)?;

        if self.guard.contains(long_url) {
            if let Some(short_code) = self.repository.find_code_by_long_url(long_url).await? {
                debug!(short_code = %short_code, correlation_id, "Known URL - returning existing code");
                return Ok(ShortenOutcome {
                    short_code,
                    created: false,
                });
            }
            debug!(correlation_id, "Membership guard false positive");
        }

        let short_code = derive_code(long_url);

        match self.repository.insert_if_absent(&short_code, long_url).await? {
            InsertOutcome::Inserted => {
                self.populate_cache(&short_code, long_url).await;
                self.guard.add(long_url);
                self.events.dispatch(UrlCreatedEvent::new(
                    short_code.clone(),
                    long_url.to_string(),
                    correlation_id.map(str::to_string),
                ));

                metrics::counter!("url_shortener_created_total").increment(1);
                info!(short_code = %short_code, correlation_id, "Short URL created");

                Ok(ShortenOutcome {
                    short_code,
                    created: true,
                })
            }
            InsertOutcome::AlreadyExists => self.resolve_conflict(short_code, long_url).await,
        }
    }

    /// Handles an insert that lost to an existing row with the same code.
    async fn resolve_conflict(
        &self,
        short_code: String,
        long_url: &str,
    ) -> Result<ShortenOutcome, ShortenerError> {
        let existing = match self.repository.find_code_by_long_url(long_url).await? {
            Some(code) => Some(code),
            None => self
                .repository
                .find_by_code(&short_code)
                .await?
                .filter(|mapping| mapping.long_url == long_url)
                .map(|mapping| mapping.short_code),
        };

        match existing {
            Some(code) => {
                self.guard.add(long_url);
                debug!(short_code = %code, "Concurrent create - returning existing code");
                Ok(ShortenOutcome {
                    short_code: code,
                    created: false,
                })
            }
            None => {
                warn!(short_code = %short_code, long_url, "Short code collision");
                Err(ShortenerError::CodeCollision { short_code })
            }
        }
    }

    /// Looks up the long URL for `short_code`.
    ///
    /// Returns `Ok(None)` when the code is unknown.
    pub async fn resolve(
        &self,
        short_code: &str,
        correlation_id: Option<&str>,
    ) -> Result<Option<String>, ShortenerError> {
        let started = Instant::now();

        match self.cache.get_url(short_code).await {
            Ok(Some(long_url)) => {
                record_lookup(started, "cache");
                return Ok(Some(long_url));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(short_code, correlation_id, error = %e, "Cache read failed - falling back to store");
            }
        }

        let Some(mapping) = self.repository.find_by_code(short_code).await? else {
            record_lookup(started, "not_found");
            return Ok(None);
        };

        let cache = self.cache.clone();
        let ttl = self.cache_ttl_seconds;
        let code = mapping.short_code.clone();
        let long_url = mapping.long_url.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.set_url(&code, &long_url, Some(ttl)).await {
                warn!(short_code = %code, error = %e, "Cache refill failed");
            }
        });

        record_lookup(started, "store");
        Ok(Some(mapping.long_url))
    }

    /// Loads every stored long URL into the membership guard.
    ///
    /// Pages through the store by row id, so rows inserted meanwhile are
    /// either picked up or added by their own create call.
    pub async fn seed_guard(&self) -> Result<usize, ShortenerError> {
        let mut after_id = 0;
        let mut total = 0;

        loop {
            let page = self
                .repository
                .list_long_urls(after_id, SEED_PAGE_SIZE)
                .await?;
            let Some((last_id, _)) = page.last() else {
                break;
            };
            after_id = *last_id;
            total += self.guard.add_all(page.iter().map(|(_, url)| url.as_str()));

            if (page.len() as i64) < SEED_PAGE_SIZE {
                break;
            }
        }

        info!(total, "Membership guard seeded");
        Ok(total)
    }

    async fn populate_cache(&self, short_code: &str, long_url: &str) {
        if let Err(e) = self
            .cache
            .set_url(short_code, long_url, Some(self.cache_ttl_seconds))
            .await
        {
            warn!(short_code, error = %e, "Cache populate failed");
        }
    }
}

fn record_lookup(started: Instant, source: &'static str) {
    metrics::histogram!("url_lookup_latency_seconds", "source" => source)
        .record(started.elapsed().as_secs_f64());
}
