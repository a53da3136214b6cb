//! # Franchise Queue
//!
//! The two shared mutable resources of the pipeline:
//!
//! - **IngestionQueue**: FIFO hand-off from producers to the consumer. Entries
//!   are appended at the tail and removed from the head, exactly once.
//! - **OutputLog**: append-only list of canonical records, scanned by the
//!   dashboard.
//!
//! Both are backed by Redis lists in production (`RedisStore`) and by
//! `MemoryQueue` / `MemoryLog` in tests. Every operation maps to one atomic
//! store command or one MULTI/EXEC pipeline, so no client-side locking is used.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{QueueError, Result};
pub use memory::{MemoryLog, MemoryQueue};
pub use redis_store::{RedisOutputLog, RedisQueue, RedisStore};
pub use store::{IngestionQueue, OutputLog};
