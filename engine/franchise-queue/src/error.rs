//! Error types for queue and output log operations

use franchise_core::EventError;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors raised by queue and log operations.
///
/// All of these are fatal to the operation in progress and are returned to the
/// caller; none of them leave a half-written batch behind.
#[derive(Error, Debug)]
pub enum QueueError {
    /// The backing store rejected the command or could not be reached
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// A payload could not be encoded before writing
    #[error("Serialization error: {0}")]
    Serialization(#[from] EventError),

    /// Store is unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl QueueError {
    /// Create a new unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
