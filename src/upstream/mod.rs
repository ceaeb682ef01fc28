//! Upstream gateway subsystem.
//!
//! # Data Flow
//! ```text
//! DomainService
//!     → client.rs (UpstreamGatewayClient: route, limit, break, retry, classify)
//!         → regions.rs (region token / shard → base URL)
//!         → transport.rs (one HTTP GET, no interpretation)
//!     ← error.rs (UpstreamError, UpstreamStatus)
//!
//! DomainService
//!     → resources.rs (ResourceClient: retry, classify; no limiter or breaker)
//!         → transport.rs
//! ```
//!
//! # Design Decisions
//! - 404 and 429 are answers, not errors: both come back as `Ok(None)`
//! - 403, 5xx and unexpected statuses are raised and never retried here
//! - Only transport failures feed the breaker and the retry loop

pub mod client;
pub mod error;
pub mod regions;
pub mod resources;
pub mod transport;

pub use client::UpstreamGatewayClient;
pub use error::{TransportError, UpstreamError, UpstreamResult, UpstreamStatus};
pub use regions::{Region, RoutingTable};
pub use resources::ResourceClient;
pub use transport::{HttpTransport, RawResponse, Transport, UpstreamRequest};
