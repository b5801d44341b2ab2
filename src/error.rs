use serde::Serialize;

/// Errors fetching price records. Any of these fails the whole view.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{source_name} returned {status}: {message}")]
    Status {
        source_name: String,
        status: u16,
        message: String,
    },

    #[error("{0} returned no records")]
    EmptyBody(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

impl FetchError {
    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(e) => !e.is_builder() && !e.is_decode(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout(_) => true,
            Self::EmptyBody(_) | Self::Decode(_) => false,
        }
    }
}

/// Fewer than two distinct observation dates remain, so there is nothing
/// to compare. Only the comparison and series views are affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("not enough data to compare: {distinct_dates} distinct date(s), need 2")]
pub struct InsufficientDataError {
    pub distinct_dates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> FetchError {
        FetchError::Status {
            source_name: "data.gov.in".to_string(),
            status: code,
            message: String::new(),
        }
    }

    #[test]
    fn test_auth_failures_are_not_retried() {
        assert!(!status(401).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!status(404).is_retryable());
    }

    #[test]
    fn test_server_errors_are_retried() {
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(status(429).is_retryable());
        assert!(FetchError::Timeout(10).is_retryable());
    }

    #[test]
    fn test_insufficient_data_message() {
        let err = InsufficientDataError { distinct_dates: 1 };
        assert_eq!(
            err.to_string(),
            "not enough data to compare: 1 distinct date(s), need 2"
        );
    }
}
