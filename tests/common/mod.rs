#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use metrics_exporter_prometheus::PrometheusRecorder;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use url_shortener::application::messaging::{BackgroundDispatcher, ResilientPublisher};
use url_shortener::application::services::ShortenerService;
use url_shortener::domain::entities::{DeadLetterEntry, InsertOutcome, UrlMapping};
use url_shortener::domain::membership_guard::{MembershipGuard, MembershipGuardConfig};
use url_shortener::domain::repositories::UrlRepository;
use url_shortener::error::StorageError;
use url_shortener::infrastructure::cache::{CacheResult, CacheService};
use url_shortener::infrastructure::messaging::{
    ChannelError, DeadLetterError, DeadLetterSink, Delivery, MessageChannel,
};
use url_shortener::infrastructure::resilience::{CircuitBreaker, CircuitBreakerConfig};
use url_shortener::state::AppState;

pub const BASE_URL: &str = "http://localhost:8080";
pub const TOPIC: &str = "url_created";

// ─── Store ───────────────────────────────────────────────────────────────────

/// Store fake with the same uniqueness semantics as `url_mappings`.
#[derive(Default)]
pub struct InMemoryUrlRepository {
    rows: Mutex<Vec<(i64, UrlMapping)>>,
    down: AtomicBool,
}

impl InMemoryUrlRepository {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.down.load(Ordering::SeqCst) {
            Err(StorageError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UrlRepository for InMemoryUrlRepository {
    async fn insert_if_absent(
        &self,
        short_code: &str,
        long_url: &str,
    ) -> Result<InsertOutcome, StorageError> {
        self.check()?;
        let mut rows = self.rows.lock();
        if rows.iter().any(|(_, m)| m.short_code == short_code) {
            return Ok(InsertOutcome::AlreadyExists);
        }
        let id = rows.len() as i64 + 1;
        rows.push((
            id,
            UrlMapping::new(short_code.to_string(), long_url.to_string(), Utc::now()),
        ));
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_code(&self, short_code: &str) -> Result<Option<UrlMapping>, StorageError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|(_, m)| m.short_code == short_code)
            .map(|(_, m)| m.clone()))
    }

    async fn find_code_by_long_url(&self, long_url: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .iter()
            .find(|(_, m)| m.long_url == long_url)
            .map(|(_, m)| m.short_code.clone()))
    }

    async fn list_long_urls(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<(i64, String)>, StorageError> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .iter()
            .filter(|(id, _)| *id > after_id)
            .take(limit as usize)
            .map(|(id, m)| (*id, m.long_url.clone()))
            .collect())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        self.check()
    }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn get(&self, short_code: &str) -> Option<String> {
        self.entries.lock().get(short_code).cloned()
    }
}

#[async_trait]
impl CacheService for InMemoryCache {
    async fn get_url(&self, short_code: &str) -> CacheResult<Option<String>> {
        Ok(self.get(short_code))
    }

    async fn set_url(
        &self,
        short_code: &str,
        long_url: &str,
        _ttl_seconds: Option<u64>,
    ) -> CacheResult<()> {
        self.entries
            .lock()
            .insert(short_code.to_string(), long_url.to_string());
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

// ─── Event channel ───────────────────────────────────────────────────────────

/// Channel fake that records sent payloads and can fail a number of sends.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    attempts: AtomicU32,
    failures_left: AtomicU32,
    always_fail: AtomicBool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        let channel = Self::default();
        channel.always_fail.store(true, Ordering::SeqCst);
        channel
    }

    pub fn failing_times(times: u32) -> Self {
        let channel = Self::default();
        channel.failures_left.store(times, Ordering::SeqCst);
        channel
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Payloads accepted by the channel, decoded as JSON.
    pub fn sent_events(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .iter()
            .map(|(_, payload)| serde_json::from_slice(payload).unwrap())
            .collect()
    }
}

#[async_trait]
impl MessageChannel for RecordingChannel {
    async fn send(&self, topic: &str, payload: &[u8]) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.always_fail.load(Ordering::SeqCst) {
            return Err(ChannelError::Connection("connection refused".to_string()));
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ChannelError::Timeout);
        }

        self.sent.lock().push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    fn consume(&self, _topic: &str) -> BoxStream<'static, Result<Delivery, ChannelError>> {
        stream::pending().boxed()
    }

    async fn ack(&self, _topic: &str, _delivery_id: &str) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingDeadLetterSink {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl RecordingDeadLetterSink {
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetterSink {
    async fn append(&self, entry: &DeadLetterEntry) -> Result<(), DeadLetterError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

/// Fully wired service over in-memory fakes.
pub struct TestApp {
    pub state: AppState,
    pub repository: Arc<InMemoryUrlRepository>,
    pub cache: Arc<InMemoryCache>,
    pub channel: Arc<RecordingChannel>,
    pub dead_letters: Arc<RecordingDeadLetterSink>,
    pub breaker: Arc<CircuitBreaker>,
    /// Backs `state.metrics`; scope it with `metrics::set_default_local_recorder`.
    pub recorder: PrometheusRecorder,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
}

impl TestApp {
    pub fn shortener(&self) -> &Arc<ShortenerService<dyn UrlRepository>> {
        &self.state.shortener
    }

    /// Waits for every background publish dispatched so far.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

pub fn test_app() -> TestApp {
    test_app_with_channel(RecordingChannel::default())
}

pub fn test_app_with_channel(channel: RecordingChannel) -> TestApp {
    let repository = Arc::new(InMemoryUrlRepository::default());
    let cache = Arc::new(InMemoryCache::default());
    let channel = Arc::new(channel);
    let dead_letters = Arc::new(RecordingDeadLetterSink::default());
    let breaker = Arc::new(CircuitBreaker::new(
        "event_channel",
        CircuitBreakerConfig::default(),
    ));
    let shutdown = CancellationToken::new();
    let tracker = TaskTracker::new();

    let publisher = Arc::new(ResilientPublisher::new(
        channel.clone(),
        dead_letters.clone(),
        breaker.clone(),
        TOPIC,
        shutdown.clone(),
    ));
    let guard = Arc::new(
        MembershipGuard::new(MembershipGuardConfig {
            capacity: 10_000,
            error_rate: 0.001,
        })
        .unwrap(),
    );

    let repository_dyn: Arc<dyn UrlRepository> = repository.clone();
    let shortener = Arc::new(ShortenerService::new(
        repository_dyn,
        cache.clone(),
        guard,
        Arc::new(BackgroundDispatcher::new(publisher, tracker.clone())),
    ));

    let recorder = url_shortener::infrastructure::metrics::local_recorder().unwrap();

    TestApp {
        state: AppState::new(shortener, breaker.clone(), recorder.handle(), BASE_URL),
        repository,
        cache,
        channel,
        dead_letters,
        breaker,
        recorder,
        shutdown,
        tracker,
    }
}
