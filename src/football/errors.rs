//! Error types for the football API client.
//!
//! The type is `Clone` so a single failure can fan out to every caller
//! coalesced onto the same in-flight request.

use std::sync::Arc;

#[derive(Debug, Clone, thiserror::Error)]
pub enum FootballApiError {
    /// Upstream credentials are absent. Fatal for any fetch, never retried.
    #[error("FOOTBALL_API_KEY is not configured")]
    MissingApiKey,
    /// Non-2xx HTTP response, or an API-level error envelope on a 200.
    #[error("upstream returned status {status}: {message}")]
    Upstream { status: u16, message: String },
    /// The response body could not be decoded as the expected JSON shape.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
    /// Transport-level failure (connect, timeout, TLS).
    #[error("upstream request failed: {0}")]
    Http(Arc<reqwest::Error>),
}

impl From<reqwest::Error> for FootballApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(Arc::new(err))
    }
}
