//! Circuit breaker around the raw upstream transport call.
//!
//! # States
//! - Closed: calls pass through, transport failures are counted
//! - Open: calls fail fast without touching the transport
//! - HalfOpen: one trial call is in flight after the cool-down
//!
//! # State Transitions
//! ```text
//! Closed   → Open:     consecutive failures reach fail_max
//! Open     → HalfOpen: first call after reset_timeout (becomes the trial)
//! HalfOpen → Closed:   trial succeeds, failure counter reset
//! HalfOpen → Open:     trial fails, cool-down restarts
//! ```
//!
//! # Design Decisions
//! - Only errors returned by the wrapped call count as failures; callers
//!   decide what that call covers (here: the transport, never status codes)
//! - Exactly one trial in HalfOpen, concurrent callers are rejected
//! - A trial dropped before completing counts as a failed trial

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::observability::metrics;

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_gauge(&self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::Open => 1.0,
            CircuitState::HalfOpen => 2.0,
        }
    }
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker is open")]
    Open,

    #[error("{0}")]
    Inner(E),
}

struct BreakerInner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Failure-trip state machine.
pub struct CircuitBreaker {
    fail_max: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(fail_max: u32, reset_timeout: Duration) -> Self {
        Self {
            fail_max: fail_max.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Run `operation` unless the circuit is open.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut admission = self.admit().ok_or(BreakerError::Open)?;

        match operation().await {
            Ok(value) => {
                admission.settle(true);
                Ok(value)
            }
            Err(e) => {
                admission.settle(false);
                Err(BreakerError::Inner(e))
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit breaker mutex poisoned").state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().expect("circuit breaker mutex poisoned").failures
    }

    fn admit(&self) -> Option<Admission<'_>> {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");

        match inner.state {
            CircuitState::Closed => Some(Admission::new(self, false)),
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map(|opened| opened.elapsed() >= self.reset_timeout)
                    .unwrap_or(true);
                if !cooled_down {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.trial_in_flight = true;
                metrics::record_circuit_state(CircuitState::HalfOpen);
                tracing::info!("Circuit breaker half-open, admitting trial call");
                Some(Admission::new(self, true))
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return None;
                }
                inner.trial_in_flight = true;
                Some(Admission::new(self, true))
            }
        }
    }

    fn record(&self, trial: bool, success: bool) {
        let mut inner = self.inner.lock().expect("circuit breaker mutex poisoned");

        if trial {
            inner.trial_in_flight = false;
            if success {
                inner.state = CircuitState::Closed;
                inner.failures = 0;
                inner.opened_at = None;
                metrics::record_circuit_state(CircuitState::Closed);
                tracing::info!("Circuit breaker closed after successful trial");
            } else {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                metrics::record_circuit_state(CircuitState::Open);
                tracing::warn!(
                    reset_timeout_secs = self.reset_timeout.as_secs(),
                    "Circuit breaker trial failed, reopening"
                );
            }
            return;
        }

        // Late results from calls admitted before a trip do not move the state
        if inner.state != CircuitState::Closed {
            return;
        }

        if success {
            inner.failures = 0;
            return;
        }

        inner.failures += 1;
        if inner.failures >= self.fail_max {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            metrics::record_circuit_state(CircuitState::Open);
            tracing::warn!(
                failures = inner.failures,
                reset_timeout_secs = self.reset_timeout.as_secs(),
                "Circuit breaker opened"
            );
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}

/// Ticket for one admitted call. Unsettled tickets count as failures.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl<'a> Admission<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            settled: false,
        }
    }

    fn settle(&mut self, success: bool) {
        self.settled = true;
        self.breaker.record(self.trial, success);
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            self.breaker.record(true, false);
        }
    }
}
