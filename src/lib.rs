//! Stats gateway: a rate-limited, circuit-protected client for the Riot API
//! behind a three-tier cache (process memory, Redis, Postgres).

pub mod admin;
pub mod cache;
pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod upstream;

pub use cache::{CacheCascade, CacheTiers};
pub use config::GatewayConfig;
pub use domain::DomainServices;
pub use lifecycle::Shutdown;
pub use upstream::UpstreamGatewayClient;
