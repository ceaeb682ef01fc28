//! Raw HTTP transport to the upstream API.
//!
//! The transport only moves bytes: it reports an HTTP status when one was
//! received and a `TransportError` when none was. Classification, retries,
//! and breaker accounting all happen in the gateway client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER};

use crate::config::schema::UpstreamConfig;
use crate::upstream::error::{TransportError, UpstreamError, UpstreamResult};

/// Header carrying the API credential.
pub const API_KEY_HEADER: &str = "X-Riot-Token";

/// A fully routed GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    /// Shard id the URL was resolved from.
    pub shard: String,
    pub url: String,
    pub params: Vec<(String, String)>,
}

/// A response as received, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub retry_after: Option<String>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }
}

/// Sends one request, once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport with connect and total timeouts.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(api_key: Option<&str>, connect_timeout: Duration, request_timeout: Duration) -> UpstreamResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let mut value = HeaderValue::from_str(key)
                .map_err(|_| UpstreamError::Configuration("API key is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| UpstreamError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &UpstreamConfig) -> UpstreamResult<Self> {
        let api_key = config.resolve_api_key();
        if api_key.is_none() {
            tracing::warn!(env = %config.api_key_env, "No upstream API key configured, requests will be rejected");
        }
        Self::new(
            api_key.as_deref(),
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.params)
            .send()
            .await?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            body,
            retry_after,
        })
    }
}
