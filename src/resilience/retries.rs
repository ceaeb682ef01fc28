//! Bounded retry of transient failures.
//!
//! # Responsibilities
//! - Decide whether a failure is transient (`Retryable`)
//! - Re-run the operation with exponential backoff until it succeeds,
//!   fails permanently, or runs out of attempts
//! - Surface the last error unchanged once attempts are exhausted
//!
//! # Design Decisions
//! - Only transport-level failures are transient; classified HTTP
//!   outcomes never reach this layer as errors
//! - No jitter: the schedule is deterministic (see `backoff.rs`)

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::config::schema::RetryConfig;
use crate::resilience::backoff::calculate_backoff;

/// Marks errors that are worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Attempt budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay to wait after `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(
            attempt,
            self.base_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
        )
    }

    /// Run `operation` until it succeeds or a non-retryable error occurs.
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn run<F, Fut, T, E>(&self, operation_name: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Retries exhausted"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10))
    }
}
