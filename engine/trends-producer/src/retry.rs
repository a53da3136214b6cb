//! Retry policy and circuit breaker for external calls.
//!
//! `RetryPolicy` retries one logical call with exponential backoff and jitter.
//! `CircuitBreaker` sits around whole logical calls: after enough consecutive
//! calls have failed (each after its own retries) it opens and rejects calls
//! outright until the recovery timeout passes, then lets a single probe through.

use franchise_core::config::RetryConfig;
use parking_lot::Mutex;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{Result, SourceError};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Each delay is scaled by a random factor in [1 - jitter, 1 + jitter]
    pub jitter: f64,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.backoff_multiplier,
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self { max_attempts: 1, initial_delay: Duration::ZERO, max_delay: Duration::ZERO, multiplier: 1.0, jitter: 0.0 }
    }

    /// Delay after failed attempt `attempt` (1-based), before jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    /// Delay after failed attempt `attempt` (1-based), jittered
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let factor = 1.0 - self.jitter + fastrand::f64() * 2.0 * self.jitter;
        base.mul_f64(factor)
    }

    /// Run `call` until it succeeds or attempts run out, guarded by `breaker`
    pub async fn run<F, Fut, T>(&self, breaker: &CircuitBreaker, label: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !breaker.try_acquire() {
            return Err(SourceError::CircuitOpen);
        }

        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => {
                    breaker.record_success();
                    return Ok(value);
                }
                Err(e) if attempt >= attempts => {
                    warn!("{}: giving up after {} attempts: {}", label, attempt, e);
                    breaker.record_failure();
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!("{}: attempt {} failed: {}, retrying in {:?}", label, attempt, e, delay);
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Shared across all workers of a producer
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.circuit_failure_threshold, Duration::from_secs(config.circuit_recovery_secs))
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether a call may proceed now. Moves Open to HalfOpen once the
    /// recovery timeout has passed and admits exactly one probe.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let recovered = inner.opened_at.map_or(true, |at| at.elapsed() >= self.recovery_timeout);
                if recovered {
                    info!("Circuit breaker half-open, allowing probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                }
                recovered
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    false
                } else {
                    inner.probe_in_flight = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!("Circuit breaker closed");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.probe_in_flight = false;

        let reopen = inner.state == CircuitState::HalfOpen;
        if reopen || (inner.state == CircuitState::Closed && inner.consecutive_failures >= self.failure_threshold) {
            warn!(
                "Circuit breaker open after {} consecutive failures, pausing calls for {:?}",
                inner.consecutive_failures, self.recovery_timeout
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}
