//! Circuit breaker for calls to an unreliable dependency.
//!
//! # States
//!
//! - `Closed`: calls go through; consecutive failures are counted and reaching
//!   the threshold opens the circuit.
//! - `Open`: calls are rejected immediately with [`CircuitOpen`] until the
//!   cool-down has elapsed since the circuit opened.
//! - `HalfOpen`: exactly one trial call is admitted. Success closes the
//!   circuit and resets the counter; failure re-opens it and restarts the
//!   cool-down.
//!
//! Every observation and the transition it causes happen under one mutex, so
//! concurrent callers never see a half-applied transition.
//!
//! Callers obtain a [`Permit`] from [`CircuitBreaker::try_acquire`] and report
//! the outcome through it. A permit dropped without a report (the caller was
//! cancelled) counts as neither success nor failure and frees the half-open
//! trial slot.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time the circuit stays open before admitting a trial call.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }

    fn gauge_value(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

/// A call was rejected because the circuit is open.
#[derive(Debug, Clone, thiserror::Error)]
#[error("circuit '{name}' is open (retry in {retry_in:?})")]
pub struct CircuitOpen {
    pub name: &'static str,
    pub retry_in: Duration,
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error(transparent)]
    Open(#[from] CircuitOpen),

    #[error("operation failed: {0}")]
    Inner(#[source] E),
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Thread-safe circuit breaker guarding one dependency.
pub struct CircuitBreaker {
    name: &'static str,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: &'static str, config: CircuitBreakerConfig) -> Self {
        metrics::gauge!("circuit_breaker_state", "dependency" => name)
            .set(CircuitState::Closed.gauge_value());

        Self {
            name,
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current state as seen by the next caller.
    ///
    /// An open circuit whose cool-down has elapsed reports `HalfOpen`; the
    /// recorded state only moves when [`Self::try_acquire`] admits the trial.
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();

        match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(at)) if at.elapsed() >= self.config.cooldown => {
                CircuitState::HalfOpen
            }
            (state, _) => state,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Asks permission to call the dependency.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitOpen`] while the circuit is open and cooling down, or
    /// while a half-open trial is already in flight.
    pub fn try_acquire(&self) -> Result<Permit<'_>, CircuitOpen> {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => {}
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(self.config.cooldown);

                if elapsed < self.config.cooldown {
                    debug!(
                        dependency = self.name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Circuit open - rejecting call"
                    );
                    return Err(CircuitOpen {
                        name: self.name,
                        retry_in: self.config.cooldown - elapsed,
                    });
                }

                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.trial_in_flight = true;
                info!(dependency = self.name, "Circuit half-open - admitting trial call");
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(CircuitOpen {
                        name: self.name,
                        retry_in: Duration::ZERO,
                    });
                }
                inner.trial_in_flight = true;
            }
        }

        Ok(Permit {
            breaker: self,
            settled: false,
        })
    }

    /// Runs `operation` under breaker protection, recording its outcome.
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: Future<Output = Result<T, E>>,
    {
        let permit = self.try_acquire()?;

        match operation.await {
            Ok(value) => {
                permit.succeeded();
                Ok(value)
            }
            Err(e) => {
                permit.failed();
                Err(CircuitBreakerError::Inner(e))
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::HalfOpen => {
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.trial_in_flight = false;
                self.transition(&mut inner, CircuitState::Closed);
                info!(dependency = self.name, "Circuit CLOSED - dependency recovered");
            }
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            // A call admitted before the circuit opened finished late.
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::HalfOpen => {
                inner.trial_in_flight = false;
                inner.opened_at = Some(Instant::now());
                self.transition(&mut inner, CircuitState::Open);
                warn!(
                    dependency = self.name,
                    cooldown_secs = self.config.cooldown.as_secs(),
                    "Circuit trial failed - re-opened"
                );
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;

                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.opened_at = Some(Instant::now());
                    self.transition(&mut inner, CircuitState::Open);
                    error!(
                        dependency = self.name,
                        failures = inner.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        cooldown_secs = self.config.cooldown.as_secs(),
                        "Circuit OPENED - too many consecutive failures"
                    );
                } else {
                    warn!(
                        dependency = self.name,
                        failures = inner.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "Circuit failure recorded"
                    );
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_abandoned(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        inner.state = to;
        metrics::gauge!("circuit_breaker_state", "dependency" => self.name).set(to.gauge_value());
    }
}

/// Permission to perform one call; report the outcome exactly once.
#[must_use = "report the call outcome with succeeded() or failed()"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Permit<'_> {
    pub fn succeeded(mut self) {
        self.settled = true;
        self.breaker.on_success();
    }

    pub fn failed(mut self) {
        self.settled = true;
        self.breaker.on_failure();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandoned();
        }
    }
}
