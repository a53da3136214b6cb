//! Error types for the consumer

use franchise_core::EventError;
use thiserror::Error;

/// Failure to mirror records into the snapshot file
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Encode(#[from] EventError),
}
