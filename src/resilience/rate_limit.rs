//! Continuous-refill token bucket guarding upstream calls.
//!
//! # Responsibilities
//! - Hold a `RateBudget` (allowance + last check) per window
//! - Delay callers until a token is available; never reject
//! - Chain several windows so every call pays each of them in turn
//!
//! # Design Decisions
//! - The budget sits behind a `tokio::sync::Mutex`, held across the sleep, so
//!   concurrent callers queue FIFO and cannot spend the same token twice
//! - Allowance is clamped to `rate` on every refill
//! - After sleeping, `last_check` moves to the wake instant so the slept
//!   interval is not credited a second time on the next call

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::observability::metrics;

/// One rate window: at most `rate` calls per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct RateWindow {
    /// Tokens granted per period.
    pub rate: u32,

    /// Window length in seconds.
    pub period_secs: f64,
}

impl RateWindow {
    pub const fn new(rate: u32, period_secs: f64) -> Self {
        Self { rate, period_secs }
    }

    fn tokens_per_sec(&self) -> f64 {
        self.rate as f64 / self.period_secs
    }

    fn secs_per_token(&self) -> f64 {
        self.period_secs / self.rate as f64
    }
}

/// Default upstream windows: 20 per second, then 100 per two minutes.
pub const DEFAULT_WINDOWS: [RateWindow; 2] = [RateWindow::new(20, 1.0), RateWindow::new(100, 120.0)];

struct RateBudget {
    allowance: f64,
    last_check: Instant,
}

/// A single-window limiter.
pub struct RateLimiter {
    window: RateWindow,
    budget: Mutex<RateBudget>,
}

impl RateLimiter {
    /// Create a limiter that starts with a full bucket.
    pub fn new(window: RateWindow) -> Self {
        Self {
            window,
            budget: Mutex::new(RateBudget {
                allowance: window.rate as f64,
                last_check: Instant::now(),
            }),
        }
    }

    pub fn window(&self) -> RateWindow {
        self.window
    }

    /// Wait until a token is available and consume it.
    ///
    /// Returns how long the caller was suspended.
    pub async fn acquire(&self) -> Duration {
        let mut budget = self.budget.lock().await;
        let rate = self.window.rate as f64;

        // 1. Refill for the time elapsed since the last call
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(budget.last_check).as_secs_f64();
        budget.last_check = now;
        budget.allowance = (budget.allowance + elapsed * self.window.tokens_per_sec()).min(rate);

        // 2. Spend a whole token if one is there
        if budget.allowance >= 1.0 {
            budget.allowance -= 1.0;
            return Duration::ZERO;
        }

        // 3. Otherwise sleep for the missing fraction, still holding the lock
        let wait = Duration::from_secs_f64((1.0 - budget.allowance) * self.window.secs_per_token());
        tracing::debug!(
            rate = self.window.rate,
            period_secs = self.window.period_secs,
            wait_ms = wait.as_millis() as u64,
            "Rate window exhausted, waiting"
        );
        tokio::time::sleep(wait).await;
        budget.allowance = 0.0;
        budget.last_check = Instant::now();

        wait
    }

    /// Current allowance, or `None` while a caller holds the budget.
    pub fn allowance(&self) -> Option<f64> {
        self.budget.try_lock().ok().map(|budget| budget.allowance)
    }
}

/// Ordered set of windows acquired one after another.
///
/// Total wait is the sum across windows, not the maximum.
pub struct RateLimiterChain {
    limiters: Vec<RateLimiter>,
}

impl RateLimiterChain {
    pub fn new(windows: &[RateWindow]) -> Self {
        Self {
            limiters: windows.iter().copied().map(RateLimiter::new).collect(),
        }
    }

    /// Acquire one token from every window in order.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        for limiter in &self.limiters {
            waited += limiter.acquire().await;
        }
        if !waited.is_zero() {
            metrics::record_rate_limit_wait(waited);
        }
        waited
    }

    pub fn limiters(&self) -> &[RateLimiter] {
        &self.limiters
    }
}

impl Default for RateLimiterChain {
    fn default() -> Self {
        Self::new(&DEFAULT_WINDOWS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_full_bucket_is_free() {
        let limiter = RateLimiter::new(RateWindow::new(20, 1.0));
        let start = Instant::now();
        for _ in 0..20 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_twenty_first_call_waits_one_token_interval() {
        let limiter = RateLimiter::new(RateWindow::new(20, 1.0));
        for _ in 0..20 {
            limiter.acquire().await;
        }
        let after_twentieth = Instant::now();
        limiter.acquire().await;
        assert!(after_twentieth.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_rate_takes_a_full_period() {
        let limiter = Arc::new(RateLimiter::new(RateWindow::new(20, 1.0)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..40 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_allowance_never_exceeds_rate() {
        let limiter = RateLimiter::new(RateWindow::new(5, 1.0));
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(60)).await;
        limiter.acquire().await;
        let allowance = limiter.allowance().unwrap();
        assert!(allowance <= 5.0);
        assert!((allowance - 4.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_waits_are_additive() {
        let chain = RateLimiterChain::new(&[RateWindow::new(1, 1.0), RateWindow::new(1, 2.0)]);
        assert_eq!(chain.acquire().await, Duration::ZERO);

        let start = Instant::now();
        let waited = chain.acquire().await;
        // 1s for the first window, then the remaining 1s of the second
        assert!(waited >= Duration::from_secs(2));
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
