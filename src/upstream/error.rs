//! Upstream error taxonomy and response classification.

use serde::Serialize;
use thiserror::Error;

use crate::resilience::Retryable;

/// Transport-level failure: the request never produced an HTTP status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("network error: {0}")]
    Network(String),
}

impl Retryable for TransportError {
    fn is_retryable(&self) -> bool {
        true
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Errors surfaced by the gateway client.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("upstream unavailable: circuit breaker open")]
    CircuitOpen,

    #[error("upstream rejected the credential (403)")]
    Auth,

    #[error("upstream server error ({status})")]
    Server { status: u16 },

    #[error("unexpected upstream status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("failed to decode upstream payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid gateway configuration: {0}")]
    Configuration(String),
}

impl Retryable for UpstreamError {
    fn is_retryable(&self) -> bool {
        matches!(self, UpstreamError::Transport(_))
    }
}

pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// How an HTTP status is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamStatus {
    /// 200: payload is decoded and returned.
    Success,
    /// 404: expected absence.
    Absent,
    /// 429: soft miss, never cached.
    RateLimited,
    /// 403: bad or expired credential.
    AuthError,
    /// 5xx.
    ServerError,
    /// Anything else.
    Unexpected,
}

impl UpstreamStatus {
    pub fn classify(status: u16) -> Self {
        match status {
            200 => UpstreamStatus::Success,
            404 => UpstreamStatus::Absent,
            429 => UpstreamStatus::RateLimited,
            403 => UpstreamStatus::AuthError,
            500..=599 => UpstreamStatus::ServerError,
            _ => UpstreamStatus::Unexpected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamStatus::Success => "success",
            UpstreamStatus::Absent => "absent",
            UpstreamStatus::RateLimited => "rate_limited",
            UpstreamStatus::AuthError => "auth_error",
            UpstreamStatus::ServerError => "server_error",
            UpstreamStatus::Unexpected => "unexpected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(UpstreamStatus::classify(200), UpstreamStatus::Success);
        assert_eq!(UpstreamStatus::classify(404), UpstreamStatus::Absent);
        assert_eq!(UpstreamStatus::classify(429), UpstreamStatus::RateLimited);
        assert_eq!(UpstreamStatus::classify(403), UpstreamStatus::AuthError);
        assert_eq!(UpstreamStatus::classify(500), UpstreamStatus::ServerError);
        assert_eq!(UpstreamStatus::classify(503), UpstreamStatus::ServerError);
        assert_eq!(UpstreamStatus::classify(204), UpstreamStatus::Unexpected);
        assert_eq!(UpstreamStatus::classify(401), UpstreamStatus::Unexpected);
    }

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(UpstreamError::Transport(TransportError::Timeout).is_retryable());
        assert!(!UpstreamError::CircuitOpen.is_retryable());
        assert!(!UpstreamError::Auth.is_retryable());
        assert!(!UpstreamError::Server { status: 503 }.is_retryable());
        assert!(!UpstreamError::UnknownRegion("x".into()).is_retryable());
    }
}
