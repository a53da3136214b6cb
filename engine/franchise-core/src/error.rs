//! Error types for event parsing and enrichment

use thiserror::Error;

/// Result type alias for event operations
pub type Result<T> = std::result::Result<T, EventError>;

/// Reasons an event cannot become a canonical record
#[derive(Error, Debug)]
pub enum EventError {
    /// Payload is not valid JSON or does not have the event shape
    #[error("Malformed event: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Neither `title` nor `metrics.title` carries a non-empty string
    #[error("Event has no title")]
    MissingTitle,

    /// Event reached enrichment without a timestamp
    #[error("Event has no timestamp")]
    MissingTimestamp,

    /// Record or event could not be encoded for the wire
    #[error("Serialization error: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl EventError {
    /// Whether the error describes a bad payload (dropped and counted) rather than a local fault
    pub fn is_invalid_payload(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::MissingTitle | Self::MissingTimestamp)
    }
}
