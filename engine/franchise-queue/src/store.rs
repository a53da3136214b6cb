//! Store traits shared by producers, the consumer and the dashboard

use franchise_core::{CanonicalRecord, RawEvent};

use crate::error::Result;

/// FIFO hand-off between many producers and one consumer group
#[async_trait::async_trait]
pub trait IngestionQueue: Send + Sync {
    /// Append already-encoded entries to the tail in order, atomically.
    /// Returns the queue length after the push.
    async fn enqueue_raw(&self, payloads: &[String]) -> Result<u64>;

    /// Atomically remove up to `max_n` entries from the head, oldest first.
    /// Returns an empty vector when the queue is empty.
    async fn dequeue_batch(&self, max_n: usize) -> Result<Vec<String>>;

    /// Current queue length
    async fn len(&self) -> Result<u64>;

    /// Append one event
    async fn enqueue(&self, event: &RawEvent) -> Result<u64> {
        self.enqueue_raw(&[event.to_json()?]).await
    }

    /// Append a batch of events as one atomic push
    async fn enqueue_batch(&self, events: &[RawEvent]) -> Result<u64> {
        let payloads = events.iter().map(RawEvent::to_json).collect::<std::result::Result<Vec<_>, _>>()?;
        self.enqueue_raw(&payloads).await
    }
}

/// Append-only record log read in full by the dashboard
#[async_trait::async_trait]
pub trait OutputLog: Send + Sync {
    /// Append encoded records in order, atomically. Returns the log length after the append.
    async fn append_raw(&self, payloads: &[String]) -> Result<u64>;

    /// Newest `max_records` entries, oldest first
    async fn read_tail(&self, max_records: usize) -> Result<Vec<String>>;

    /// Current log length
    async fn len(&self) -> Result<u64>;

    /// Append records in processing order as one atomic write
    async fn append_batch(&self, records: &[CanonicalRecord]) -> Result<u64> {
        let payloads =
            records.iter().map(CanonicalRecord::to_json).collect::<std::result::Result<Vec<_>, _>>()?;
        self.append_raw(&payloads).await
    }
}
