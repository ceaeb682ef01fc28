//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::resilience::rate_limit::{RateWindow, DEFAULT_WINDOWS};

/// Root configuration for the stats gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Upstream API access (credential, timeouts, routing override).
    pub upstream: UpstreamConfig,

    /// Client-side rate windows.
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker around the transport.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry policy for upstream transport failures.
    pub retry: RetryConfig,

    /// Cache tiers.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Administrative HTTP surface.
    pub admin: AdminConfig,
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API credential. Empty means "read from `api_key_env`".
    pub api_key: String,

    /// Environment variable consulted when `api_key` is empty.
    pub api_key_env: String,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Route every shard to this base URL instead of the regional hosts.
    pub base_url_override: Option<String>,
}

impl UpstreamConfig {
    /// The credential to send, from config or environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if !self.api_key.is_empty() {
            return Some(self.api_key.clone());
        }
        std::env::var(&self.api_key_env).ok().filter(|key| !key.is_empty())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_key_env: "RIOT_API_KEY".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 10,
            base_url_override: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Windows acquired in order before every upstream call.
    pub windows: Vec<RateWindow>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            windows: DEFAULT_WINDOWS.to_vec(),
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive transport failures that open the circuit.
    pub fail_max: u32,

    /// Seconds the circuit stays open before a trial call.
    pub reset_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            fail_max: 5,
            reset_timeout_secs: 60,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

/// Cache tier configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Capacity of each named process-local cache.
    pub local_capacity: u64,

    /// Redis URL for the distributed tier. Unset uses an in-process store.
    pub redis_url: Option<String>,

    /// Postgres URL for the durable tier. Unset uses an in-process store.
    pub database_url: Option<String>,

    /// Connection pool size for the durable tier.
    pub database_max_connections: u32,

    /// Retry policy applied by the store clients themselves.
    pub store_retry: RetryConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            local_capacity: 1000,
            redis_url: None,
            database_url: None,
            database_max_connections: 10,
            store_retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1000,
                max_delay_ms: 5000,
            },
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin HTTP surface.
    pub enabled: bool,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
