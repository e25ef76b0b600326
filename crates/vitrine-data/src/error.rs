//! Error type for upstream fetch operations.

use std::time::Duration;

/// Error from an upstream catalog or image fetch.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Upstream answered with an error status.
    #[error("upstream error: status {status}")]
    Upstream { status: u16 },

    /// The operation exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The upstream could not be reached at all.
    #[error("connection error: {0}")]
    Connection(String),

    /// The requested entity does not exist upstream.
    #[error("not found: {0}")]
    NotFound(String),

    /// Upstream answered with a payload that does not decode.
    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether a retry could plausibly change the outcome. Server
    /// errors and transport faults are transient; a missing entity or
    /// an undecodable payload is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Upstream { status } => (500..600).contains(status),
            FetchError::Timeout(_) | FetchError::Connection(_) => true,
            FetchError::NotFound(_) | FetchError::Decode(_) => false,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Upstream { status: 502 }.is_retryable());
        assert!(FetchError::Timeout(Duration::from_millis(500)).is_retryable());
        assert!(FetchError::Connection("refused".to_string()).is_retryable());

        assert!(!FetchError::Upstream { status: 404 }.is_retryable());
        assert!(!FetchError::NotFound("p-1".to_string()).is_retryable());
        assert!(!FetchError::Decode("bad json".to_string()).is_retryable());
    }
}
