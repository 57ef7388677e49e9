//! Error types for title resolution.

use std::time::Duration;

/// Errors that can occur while resolving titles against the search API.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// HTTP request failed (network, timeout, etc.)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned an error status code.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API (HTTP 429).
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// A single attempt did not finish within the per-attempt timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Failed to parse API response.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Bad input path or input contents.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Every attempt failed with a transient error.
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: Box<ResolverError>,
    },
}

impl ResolverError {
    /// Whether a retry has a chance of succeeding.
    ///
    /// Timeouts, connection failures, HTTP 5xx and HTTP 429 are transient.
    /// Client errors, malformed responses and local failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                if let Some(status) = e.status() {
                    status.is_server_error() || status.as_u16() == 429
                } else {
                    e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
                }
            }
            Self::Api { status, .. } => *status >= 500,
            Self::RateLimited { .. } | Self::Timeout(_) => true,
            _ => false,
        }
    }

    /// Server-requested wait before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Convenience alias for Results using [`ResolverError`].
pub type Result<T> = std::result::Result<T, ResolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ResolverError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(ResolverError::RateLimited { retry_after: None }.is_transient());
        assert!(ResolverError::Api {
            status: 503,
            message: String::new()
        }
        .is_transient());

        assert!(!ResolverError::Api {
            status: 400,
            message: String::new()
        }
        .is_transient());
        assert!(!ResolverError::Parse("bad".into()).is_transient());
        assert!(!ResolverError::InvalidInput("x".into()).is_transient());
    }

    #[test]
    fn test_retry_after_only_on_rate_limit() {
        let limited = ResolverError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(ResolverError::Timeout(Duration::ZERO).retry_after(), None);
    }
}
