//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! gateway / cache / admin produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric calls are no-ops until a recorder is installed, so library code
//!   and tests never need to set one up
//! - `RUST_LOG` overrides the configured level

pub mod logging;
pub mod metrics;
