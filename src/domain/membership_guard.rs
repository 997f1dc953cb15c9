//! Probabilistic set of long URLs that have been accepted.
//!
//! The guard is an optimization for the creation path: a negative answer is
//! definitive (no false negatives), a positive answer may be a false positive
//! and is always confirmed against the store. Nothing is ever removed.
//!
//! The underlying bloom filter is not safe for concurrent mutation, so every
//! access goes through one exclusive lock. Callers must never hold the lock
//! across I/O; the API only exposes short synchronous operations to make that
//! impossible.

use bloomfilter::Bloom;
use parking_lot::Mutex;
use tracing::debug;

/// Errors raised while building the guard.
#[derive(Debug, thiserror::Error)]
#[error("membership guard initialization failed: {0}")]
pub struct GuardInitError(String);

/// Sizing parameters, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy)]
pub struct MembershipGuardConfig {
    /// Expected number of distinct long URLs.
    pub capacity: usize,
    /// Target false-positive probability (0.0 - 1.0, exclusive).
    pub error_rate: f64,
}

impl Default for MembershipGuardConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            error_rate: 0.001,
        }
    }
}

/// Process-wide bloom filter behind an exclusive lock.
pub struct MembershipGuard {
    bloom: Mutex<Bloom<str>>,
    config: MembershipGuardConfig,
}

impl MembershipGuard {
    /// Creates an empty guard.
    ///
    /// # Errors
    ///
    /// Returns [`GuardInitError`] if the capacity is zero or the error rate is
    /// outside `(0, 1)`.
    pub fn new(config: MembershipGuardConfig) -> Result<Self, GuardInitError> {
        if config.capacity == 0 {
            return Err(GuardInitError("capacity must be greater than 0".to_string()));
        }
        if !(config.error_rate > 0.0 && config.error_rate < 1.0) {
            return Err(GuardInitError(format!(
                "error rate must be in (0, 1), got {}",
                config.error_rate
            )));
        }

        let bloom = Bloom::new_for_fp_rate(config.capacity, config.error_rate)
            .map_err(|e| GuardInitError(e.to_string()))?;

        debug!(
            capacity = config.capacity,
            error_rate = config.error_rate,
            "Membership guard created"
        );

        Ok(Self {
            bloom: Mutex::new(bloom),
            config,
        })
    }

    /// Returns `true` if `long_url` may have been added; `false` means it never was.
    pub fn contains(&self, long_url: &str) -> bool {
        self.bloom.lock().check(long_url)
    }

    /// Records `long_url` as accepted.
    pub fn add(&self, long_url: &str) {
        self.bloom.lock().set(long_url);
    }

    /// Records a batch of long URLs under a single lock acquisition.
    pub fn add_all<'a, I>(&self, long_urls: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut bloom = self.bloom.lock();
        let mut added = 0;
        for url in long_urls {
            bloom.set(url);
            added += 1;
        }
        added
    }

    pub fn config(&self) -> MembershipGuardConfig {
        self.config
    }
}
