//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream call (one attempt):
//!     → rate_limit.rs (wait for a token in every window, in order)
//!     → circuit_breaker.rs (fail fast while open, count transport failures)
//!     → transport
//! Around the attempt:
//!     → retries.rs (re-run transient failures with backoff.rs delays)
//! ```
//!
//! # Design Decisions
//! - Limiter and breaker state belong to one gateway instance and live as
//!   long as it does; nothing here is a process-wide singleton
//! - The limiter only delays, it never rejects
//! - Retries never see HTTP status outcomes

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limit;
pub mod retries;

pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitState};
pub use rate_limit::{RateLimiter, RateLimiterChain, RateWindow, DEFAULT_WINDOWS};
pub use retries::{RetryPolicy, Retryable};
