//! Error types for external metric sources

use thiserror::Error;

/// Result type alias for source calls
pub type Result<T> = std::result::Result<T, SourceError>;

/// Failures of an external call. All of them are transient from the
/// producer's point of view: retried, then skipped for the cycle.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transport failure, including timeouts
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response other than a rate limit
    #[error("Upstream returned status {0}")]
    Status(u16),

    /// Upstream asked us to slow down (HTTP 429)
    #[error("Rate limited by upstream")]
    RateLimited,

    /// Call rejected locally because the circuit breaker is open
    #[error("Circuit breaker open")]
    CircuitOpen,

    /// Response body did not have the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}
