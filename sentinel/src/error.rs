//! Error taxonomy shared by every stage of the pipeline.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for core pipeline operations
pub type Result<T> = std::result::Result<T, SentinelError>;

#[derive(Error, Debug)]
pub enum SentinelError {
    /// Malformed identifier or query supplied by the caller
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Upstream resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport failure or unexpected HTTP status
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// HTTP 429 from an upstream
    #[error("Rate limited by {0}")]
    RateLimited(String),

    /// Expected markup or JSON structure is absent
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Summarization call failed
    #[error("Backend error ({backend}): {reason}")]
    Backend { backend: String, reason: String },
}

impl SentinelError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        SentinelError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn backend(backend: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        SentinelError::Backend {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    /// Failures a source absorbs into "no artifact produced".
    /// Parse, validation and IO failures are not transient and surface.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SentinelError::Network(_)
                | SentinelError::Timeout(_)
                | SentinelError::RateLimited(_)
                | SentinelError::NotFound(_)
        )
    }

    /// Classify a failure while reading a response body from `url`.
    /// reqwest does not attach the URL to decode errors.
    pub fn body(url: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            SentinelError::Parse(format!("{}: {}", url, err))
        } else {
            SentinelError::from(err)
        }
    }

    /// Map a non-success HTTP status from `url` into the taxonomy.
    pub fn from_status(status: StatusCode, url: &str) -> Self {
        match status {
            StatusCode::NOT_FOUND => SentinelError::NotFound(url.to_string()),
            StatusCode::TOO_MANY_REQUESTS => SentinelError::RateLimited(url.to_string()),
            _ => SentinelError::Network(format!("{} returned HTTP {}", url, status)),
        }
    }
}

impl From<reqwest::Error> for SentinelError {
    fn from(err: reqwest::Error) -> Self {
        let target = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "request".to_string());
        if err.is_timeout() {
            SentinelError::Timeout(target)
        } else if err.is_decode() {
            SentinelError::Parse(format!("{}: {}", target, err))
        } else {
            SentinelError::Network(format!("{}: {}", target, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(matches!(
            SentinelError::from_status(StatusCode::NOT_FOUND, "u"),
            SentinelError::NotFound(_)
        ));
        assert!(matches!(
            SentinelError::from_status(StatusCode::TOO_MANY_REQUESTS, "u"),
            SentinelError::RateLimited(_)
        ));
        let err = SentinelError::from_status(StatusCode::BAD_GATEWAY, "http://x");
        assert!(matches!(err, SentinelError::Network(_)));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn transient_kinds() {
        assert!(SentinelError::Timeout("x".into()).is_transient());
        assert!(SentinelError::RateLimited("x".into()).is_transient());
        assert!(!SentinelError::Parse("x".into()).is_transient());
        assert!(!SentinelError::Validation("x".into()).is_transient());
        assert!(!SentinelError::backend("hosted", "boom").is_transient());
    }
}
