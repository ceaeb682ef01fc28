//! Client for static third-party resources (community datasets, CDN JSON).
//!
//! These hosts sit outside the rate-limited upstream: no limiter, no breaker,
//! no API key. Transport failures are retried with the configured backoff.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::GatewayConfig;
use crate::resilience::RetryPolicy;
use crate::upstream::error::{UpstreamError, UpstreamResult, UpstreamStatus};
use crate::upstream::transport::{HttpTransport, Transport, UpstreamRequest};

/// Shard label attached to resource requests in logs.
const RESOURCE_SHARD: &str = "resources";

pub struct ResourceClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl ResourceClient {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub fn from_config(config: &GatewayConfig) -> UpstreamResult<Self> {
        let transport = HttpTransport::new(
            None,
            Duration::from_secs(config.upstream.connect_timeout_secs),
            Duration::from_secs(config.upstream.request_timeout_secs),
        )?;
        Ok(Self::new(Arc::new(transport), RetryPolicy::from_config(&config.retry)))
    }

    /// GET `url` and decode the body.
    ///
    /// `Ok(None)` on 404 and 429, like the gateway client.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> UpstreamResult<Option<T>> {
        let request = UpstreamRequest {
            shard: RESOURCE_SHARD.to_string(),
            url: url.to_string(),
            params: Vec::new(),
        };

        let request = &request;
        let transport = &self.transport;
        let response = self
            .retry
            .run("resource_get", move |_| async move {
                transport.send(request).await.map_err(UpstreamError::Transport)
            })
            .await?;

        match UpstreamStatus::classify(response.status) {
            UpstreamStatus::Success => Ok(Some(serde_json::from_slice(&response.body)?)),
            UpstreamStatus::Absent | UpstreamStatus::RateLimited => {
                tracing::debug!(url, status = response.status, "Resource unavailable");
                Ok(None)
            }
            UpstreamStatus::AuthError => Err(UpstreamError::Auth),
            UpstreamStatus::ServerError => Err(UpstreamError::Server { status: response.status }),
            UpstreamStatus::Unexpected => Err(UpstreamError::UnexpectedStatus { status: response.status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::client::tests::ScriptedTransport;
    use crate::upstream::error::TransportError;
    use crate::upstream::transport::RawResponse;
    use serde_json::Value;

    const URL: &str = "https://cdn.example.net/rates.json";

    fn client(transport: Arc<ScriptedTransport>) -> ResourceClient {
        ResourceClient::new(
            transport,
            RetryPolicy::new(3, Duration::from_millis(10), Duration::from_millis(50)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_are_retried() {
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Timeout),
            Err(TransportError::Connect("refused".into())),
            Ok(RawResponse::new(200, r#"{"data":{}}"#)),
        ]);

        let body: Option<Value> = client(transport.clone()).get_json(URL).await.unwrap();

        assert_eq!(body.unwrap()["data"], serde_json::json!({}));
        assert_eq!(transport.calls(), 3);
        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url, URL);
        assert!(seen[0].params.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Timeout)]);

        let result: UpstreamResult<Option<Value>> = client(transport.clone()).get_json(URL).await;

        assert!(matches!(result, Err(UpstreamError::Transport(TransportError::Timeout))));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_statuses_are_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(404, ""))]);
        let missing: Option<Value> = client(transport.clone()).get_json(URL).await.unwrap();
        assert!(missing.is_none());
        assert_eq!(transport.calls(), 1);

        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(503, ""))]);
        let result: UpstreamResult<Option<Value>> = client(transport.clone()).get_json(URL).await;
        assert!(matches!(result, Err(UpstreamError::Server { status: 503 })));
        assert_eq!(transport.calls(), 1);
    }
}
