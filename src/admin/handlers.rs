use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::admin::AdminState;
use crate::cache::{FlushReport, LocalCacheStats, StoreError};
use crate::resilience::CircuitState;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("cache flush incomplete: {0}")]
    Flush(#[from] StoreError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct RateWindowStatus {
    pub rate: u32,
    pub period_secs: f64,
    /// `None` while a caller holds the limiter.
    pub allowance: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub circuit: CircuitState,
    pub consecutive_failures: u32,
    pub rate_windows: Vec<RateWindowStatus>,
    pub local_caches: Vec<LocalCacheStats>,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let breaker = state.gateway.breaker();
    let rate_windows = state
        .gateway
        .limiter()
        .limiters()
        .iter()
        .map(|limiter| {
            let window = limiter.window();
            RateWindowStatus {
                rate: window.rate,
                period_secs: window.period_secs,
                allowance: limiter.allowance(),
            }
        })
        .collect();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        circuit: breaker.state(),
        consecutive_failures: breaker.failure_count(),
        rate_windows,
        local_caches: state.tiers.registry().stats(),
    })
}

/// Clear every process-local cache and the distributed store.
pub async fn flush_caches(State(state): State<AdminState>) -> Result<Json<FlushReport>, AdminError> {
    tracing::info!("Administrative cache flush requested");
    let report = state.tiers.flush_all().await?;
    Ok(Json(report))
}
