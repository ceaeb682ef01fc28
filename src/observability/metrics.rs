//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): upstream responses by classified status
//! - `gateway_rate_limit_wait_seconds` (histogram): time spent in the limiter
//! - `gateway_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `cache_hits_total` (counter): hits by tier
//! - `cache_misses_total` (counter): reads that fell through every tier
//! - `cache_store_errors_total` (counter): tier store failures by tier
//! - `cache_flushes_total` (counter): administrative flushes

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_upstream_response(status: &'static str) {
    metrics::counter!("gateway_requests_total", "status" => status).increment(1);
}

pub fn record_rate_limit_wait(waited: Duration) {
    metrics::histogram!("gateway_rate_limit_wait_seconds").record(waited.as_secs_f64());
}

pub fn record_circuit_state(state: CircuitState) {
    metrics::gauge!("gateway_circuit_state").set(state.as_gauge());
}

pub fn record_cache_hit(tier: &'static str) {
    metrics::counter!("cache_hits_total", "tier" => tier).increment(1);
}

pub fn record_cache_miss() {
    metrics::counter!("cache_misses_total").increment(1);
}

pub fn record_store_error(tier: &'static str) {
    metrics::counter!("cache_store_errors_total", "tier" => tier).increment(1);
}

pub fn record_flush() {
    metrics::counter!("cache_flushes_total").increment(1);
}
