//! Feed client error types.

use std::time::Duration;

/// Errors from the upstream feed clients.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON deserialization failed
    #[error("JSON parse error: {message}{}", .body.as_ref().map(|b| format!(" (body: {b})")).unwrap_or_default())]
    Json {
        message: String,
        body: Option<String>,
    },

    /// API returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Provider answered but reported an error instead of data
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Station, trip or composition not known to the provider
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limited by the API
    #[error("rate limited by upstream")]
    RateLimited,

    /// Invalid API key or unauthorized
    #[error("unauthorized (invalid API key)")]
    Unauthorized,

    /// Call exceeded the caller's deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Feature not configured or not available
    #[error("not configured: {0}")]
    NotConfigured(String),
}

impl FeedError {
    /// Build a JSON error keeping a bounded prefix of the offending body.
    pub(crate) fn json(err: impl std::fmt::Display, body: &str) -> Self {
        FeedError::Json {
            message: err.to_string(),
            body: Some(body.chars().take(500).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FeedError::NotFound("station 8000080".into());
        assert_eq!(err.to_string(), "not found: station 8000080");

        let err = FeedError::Api {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "API error 500: Internal Server Error");

        let err = FeedError::json("expected string", "{}");
        assert_eq!(err.to_string(), "JSON parse error: expected string (body: {})");

        let err = FeedError::Json {
            message: "eof".into(),
            body: None,
        };
        assert_eq!(err.to_string(), "JSON parse error: eof");
    }
}
