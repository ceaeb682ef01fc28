//! Cache store errors.

use thiserror::Error;

use crate::resilience::Retryable;

/// Failure of a tier's backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection error: {0}")]
    Connection(String),

    #[error("store operation timed out")]
    Timeout,

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Connection(_) | StoreError::Timeout)
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_timeout() {
            StoreError::Timeout
        } else if e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
            StoreError::Connection(e.to_string())
        } else {
            StoreError::Backend(e.to_string())
        }
    }
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(e: deadpool_redis::PoolError) -> Self {
        match e {
            deadpool_redis::PoolError::Timeout(_) => StoreError::Timeout,
            other => StoreError::Connection(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                StoreError::Connection(e.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_and_timeout_are_retryable() {
        assert!(StoreError::Connection("refused".into()).is_retryable());
        assert!(StoreError::Timeout.is_retryable());
        assert!(!StoreError::Backend("WRONGTYPE".into()).is_retryable());
        assert!(!StoreError::InvalidQuery("too many filters".into()).is_retryable());
    }

    #[test]
    fn test_sqlx_pool_timeout_maps_to_timeout() {
        assert!(matches!(StoreError::from(sqlx::Error::PoolTimedOut), StoreError::Timeout));
        assert!(matches!(StoreError::from(sqlx::Error::RowNotFound), StoreError::Backend(_)));
    }
}
