//! # Franchise Consumer
//!
//! Single-threaded drain loop between the ingestion queue and the output log.
//! Each dequeued batch is enriched item by item, published to the output log in
//! dequeue order with one atomic append, and buffered for the NDJSON snapshot.

pub mod consumer;
pub mod error;
pub mod snapshot;

pub use consumer::{BatchOutcome, Consumer, ConsumerState, ConsumerStats};
pub use error::SnapshotError;
pub use snapshot::SnapshotWriter;
