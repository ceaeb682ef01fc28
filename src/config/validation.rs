//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows, attempts, delays, capacities)
//! - Check that addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, RetryConfig};

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic constraint and collect all violations.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rate_limit.windows.is_empty() {
        errors.push(ValidationError::new("rate_limit.windows", "at least one window is required"));
    }
    for (i, window) in config.rate_limit.windows.iter().enumerate() {
        if window.rate == 0 {
            errors.push(ValidationError::new(format!("rate_limit.windows[{i}].rate"), "must be at least 1"));
        }
        if !(window.period_secs.is_finite() && window.period_secs > 0.0) {
            errors.push(ValidationError::new(
                format!("rate_limit.windows[{i}].period_secs"),
                "must be a finite number greater than 0",
            ));
        }
    }

    if config.circuit_breaker.fail_max == 0 {
        errors.push(ValidationError::new("circuit_breaker.fail_max", "must be at least 1"));
    }

    check_retry("retry", &config.retry, &mut errors);
    check_retry("cache.store_retry", &config.cache.store_retry, &mut errors);

    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.request_timeout_secs", "must be greater than 0"));
    }
    if let Some(base) = &config.upstream.base_url_override {
        if let Err(e) = url::Url::parse(base) {
            errors.push(ValidationError::new("upstream.base_url_override", format!("invalid URL: {e}")));
        }
    }

    if config.cache.local_capacity == 0 {
        errors.push(ValidationError::new("cache.local_capacity", "must be at least 1"));
    }
    for (field, value) in [("cache.redis_url", &config.cache.redis_url), ("cache.database_url", &config.cache.database_url)] {
        if let Some(value) = value {
            if let Err(e) = url::Url::parse(value) {
                errors.push(ValidationError::new(field, format!("invalid URL: {e}")));
            }
        }
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("admin.bind_address", "not a socket address"));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_retry(prefix: &str, retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new(format!("{prefix}.max_attempts"), "must be at least 1"));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            format!("{prefix}.base_delay_ms"),
            "must not exceed max_delay_ms",
        ));
    }
}
