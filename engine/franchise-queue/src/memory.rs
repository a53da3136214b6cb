//! In-memory queue and log (for testing)

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use franchise_core::CanonicalRecord;

use crate::error::{QueueError, Result};
use crate::store::{IngestionQueue, OutputLog};

/// In-memory ingestion queue.
///
/// Clones share the same underlying list, like two clients of one store.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    items: Arc<Mutex<VecDeque<String>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store going away (or coming back)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of the queued payloads, head first
    pub fn pending(&self) -> Vec<String> {
        self.items.lock().iter().cloned().collect()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::unavailable("in-memory queue marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IngestionQueue for MemoryQueue {
    async fn enqueue_raw(&self, payloads: &[String]) -> Result<u64> {
        self.check_available()?;
        let mut items = self.items.lock();
        items.extend(payloads.iter().cloned());
        Ok(items.len() as u64)
    }

    async fn dequeue_batch(&self, max_n: usize) -> Result<Vec<String>> {
        self.check_available()?;
        let mut items = self.items.lock();
        let take = max_n.min(items.len());
        Ok(items.drain(..take).collect())
    }

    async fn len(&self) -> Result<u64> {
        self.check_available()?;
        Ok(self.items.lock().len() as u64)
    }
}

/// In-memory output log with the same retention behaviour as the Redis one
#[derive(Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<String>>>,
    max_len: Option<usize>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log that keeps only the newest `max_len` entries
    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len: Some(max_len), ..Self::default() }
    }

    /// Simulate the store going away (or coming back)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Raw entries, oldest first
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Entries decoded as records; undecodable entries are skipped
    pub fn records(&self) -> Vec<CanonicalRecord> {
        self.entries.lock().iter().filter_map(|raw| CanonicalRecord::from_json(raw).ok()).collect()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::unavailable("in-memory log marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl OutputLog for MemoryLog {
    async fn append_raw(&self, payloads: &[String]) -> Result<u64> {
        self.check_available()?;
        let mut entries = self.entries.lock();
        entries.extend(payloads.iter().cloned());
        if let Some(max_len) = self.max_len {
            if entries.len() > max_len {
                let excess = entries.len() - max_len;
                entries.drain(..excess);
            }
        }
        Ok(entries.len() as u64)
    }

    async fn read_tail(&self, max_records: usize) -> Result<Vec<String>> {
        self.check_available()?;
        let entries = self.entries.lock();
        let start = entries.len().saturating_sub(max_records);
        Ok(entries[start..].to_vec())
    }

    async fn len(&self) -> Result<u64> {
        self.check_available()?;
        Ok(self.entries.lock().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use franchise_core::{Metrics, RawEvent};

    fn event(title: &str) -> RawEvent {
        RawEvent::new(1_700_000_000, title, Metrics::default())
    }

    #[tokio::test]
    async fn test_fifo_preservation() {
        let queue = MemoryQueue::new();
        queue.enqueue(&event("A")).await.unwrap();
        queue.enqueue(&event("B")).await.unwrap();
        queue.enqueue(&event("C")).await.unwrap();

        let first: Vec<RawEvent> =
            queue.dequeue_batch(2).await.unwrap().iter().map(|raw| RawEvent::parse(raw).unwrap()).collect();
        assert_eq!(first, vec![event("A"), event("B")]);

        let second: Vec<RawEvent> =
            queue.dequeue_batch(2).await.unwrap().iter().map(|raw| RawEvent::parse(raw).unwrap()).collect();
        assert_eq!(second, vec![event("C")]);

        assert!(queue.dequeue_batch(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dequeued_items_are_not_recoverable() {
        let queue = MemoryQueue::new();
        let other_client = queue.clone();
        queue.enqueue_batch(&[event("A"), event("B")]).await.unwrap();

        let taken = queue.dequeue_batch(10).await.unwrap();
        assert_eq!(taken.len(), 2);
        assert_eq!(other_client.len().await.unwrap(), 0);
        assert!(other_client.dequeue_batch(10).await.unwrap().is_empty());
    }

    #[test]
    fn test_enqueue_returns_length() {
        let queue = MemoryQueue::new();
        tokio_test::block_on(async {
            assert_eq!(queue.enqueue_batch(&[event("A"), event("B")]).await.unwrap(), 2);
            assert_eq!(queue.enqueue(&event("C")).await.unwrap(), 3);
            assert!(queue.enqueue_batch(&[]).await.is_ok());
        });
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_loudly() {
        let queue = MemoryQueue::new();
        queue.set_unavailable(true);
        assert!(matches!(queue.enqueue(&event("A")).await, Err(QueueError::Unavailable(_))));
        assert!(queue.dequeue_batch(1).await.is_err());

        queue.set_unavailable(false);
        assert_eq!(queue.enqueue(&event("A")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_log_read_tail_is_oldest_first() {
        let log = MemoryLog::new();
        let payloads: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        log.append_raw(&payloads).await.unwrap();

        assert_eq!(log.read_tail(3).await.unwrap(), vec!["2", "3", "4"]);
        assert_eq!(log.read_tail(100).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_log_retention_keeps_newest() {
        let log = MemoryLog::with_max_len(3);
        let payloads: Vec<String> = (0..5).map(|i| i.to_string()).collect();

        assert_eq!(log.append_raw(&payloads).await.unwrap(), 3);
        assert_eq!(log.entries(), vec!["2", "3", "4"]);
    }
}
