//! Resilient gateway client for the upstream game-data API.
//!
//! # Data Flow
//! ```text
//! get(region, endpoint, params)
//!     → RoutingTable::resolve (unknown region: fail, no retry)
//!     → RetryPolicy::run
//!         → RateLimiterChain::acquire (every window, in order)
//!         → CircuitBreaker::call
//!             → Transport::send
//!     → classify status
//!         200 → Some(payload)   404/429 → None   403/5xx/other → Err
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::resilience::{BreakerError, CircuitBreaker, RateLimiterChain, RetryPolicy};
use crate::upstream::error::{UpstreamError, UpstreamResult, UpstreamStatus};
use crate::upstream::regions::RoutingTable;
use crate::upstream::transport::{HttpTransport, RawResponse, Transport, UpstreamRequest};

/// Entry point for every upstream call.
///
/// Owns one limiter chain and one breaker; share it behind an `Arc` so that
/// every service draws from the same budget.
pub struct UpstreamGatewayClient {
    routing: RoutingTable,
    transport: Arc<dyn Transport>,
    limiter: RateLimiterChain,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl UpstreamGatewayClient {
    pub fn new(
        routing: RoutingTable,
        transport: Arc<dyn Transport>,
        limiter: RateLimiterChain,
        breaker: CircuitBreaker,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            routing,
            transport,
            limiter,
            breaker,
            retry,
        }
    }

    /// Build the production client: HTTP transport plus configured policies.
    pub fn from_config(config: &GatewayConfig) -> UpstreamResult<Self> {
        let routing = match &config.upstream.base_url_override {
            Some(base) => RoutingTable::uniform(base)?,
            None => RoutingTable::riot(),
        };
        let transport = HttpTransport::from_config(&config.upstream)?;

        Ok(Self::new(
            routing,
            Arc::new(transport),
            RateLimiterChain::new(&config.rate_limit.windows),
            CircuitBreaker::new(
                config.circuit_breaker.fail_max,
                Duration::from_secs(config.circuit_breaker.reset_timeout_secs),
            ),
            RetryPolicy::from_config(&config.retry),
        ))
    }

    /// Fetch `endpoint` from the shard behind `region`.
    ///
    /// `Ok(None)` means the upstream had nothing for us this time (404, or
    /// throttled with 429). Neither outcome should be cached.
    pub async fn get(&self, region: &str, endpoint: &str, params: &[(&str, String)]) -> UpstreamResult<Option<Value>> {
        let base = self.routing.resolve(region)?;
        let request = UpstreamRequest {
            shard: region.to_string(),
            url: format!("{base}{endpoint}"),
            params: params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        };

        let request = &request;
        let response = self
            .retry
            .run("upstream_get", move |_| self.attempt(request))
            .await?;

        self.classify(request, response)
    }

    /// [`get`](Self::get) with the payload decoded into `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        region: &str,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> UpstreamResult<Option<T>> {
        match self.get(region, endpoint, params).await? {
            Some(payload) => Ok(Some(serde_json::from_value(payload)?)),
            None => Ok(None),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn limiter(&self) -> &RateLimiterChain {
        &self.limiter
    }

    async fn attempt(&self, request: &UpstreamRequest) -> UpstreamResult<RawResponse> {
        self.limiter.acquire().await;

        match self.breaker.call(|| self.transport.send(request)).await {
            Ok(response) => Ok(response),
            Err(BreakerError::Open) => {
                tracing::debug!(shard = %request.shard, "Circuit open, skipping upstream call");
                Err(UpstreamError::CircuitOpen)
            }
            Err(BreakerError::Inner(e)) => Err(UpstreamError::Transport(e)),
        }
    }

    fn classify(&self, request: &UpstreamRequest, response: RawResponse) -> UpstreamResult<Option<Value>> {
        let status = UpstreamStatus::classify(response.status);
        metrics::record_upstream_response(status.as_str());

        match status {
            UpstreamStatus::Success => Ok(Some(serde_json::from_slice(&response.body)?)),
            UpstreamStatus::Absent => {
                tracing::debug!(url = %request.url, "Upstream reports no such entity");
                Ok(None)
            }
            UpstreamStatus::RateLimited => {
                tracing::warn!(
                    url = %request.url,
                    retry_after = response.retry_after.as_deref().unwrap_or("unknown"),
                    "Upstream throttled the request despite local limiting"
                );
                Ok(None)
            }
            UpstreamStatus::AuthError => {
                tracing::error!(url = %request.url, "Upstream rejected the API key");
                Err(UpstreamError::Auth)
            }
            UpstreamStatus::ServerError => {
                tracing::warn!(url = %request.url, status = response.status, "Upstream server error");
                Err(UpstreamError::Server { status: response.status })
            }
            UpstreamStatus::Unexpected => {
                tracing::warn!(url = %request.url, status = response.status, "Unexpected upstream status");
                Err(UpstreamError::UnexpectedStatus { status: response.status })
            }
        }
    }
}
