//! Consumer state machine.
//!
//! Two states only. `Idle`: the last dequeue came back empty, so the loop sleeps
//! for the idle interval and polls again. `Draining`: a batch was dequeued and is
//! processed to completion before the queue is checked again. The loop never
//! exits on its own; the safe point for killing the process is between batches.

use franchise_core::config::ConsumerConfig;
use franchise_core::{enrich_raw, unix_now, CanonicalRecord};
use franchise_queue::{IngestionQueue, OutputLog, QueueError};
use tracing::{debug, error, info, warn};

use crate::snapshot::SnapshotWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Draining,
}

/// Running counters since the consumer started
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Records published to the output log
    pub processed: u64,
    /// Dequeued items dropped as malformed
    pub skipped: u64,
    pub snapshot_records_written: u64,
    pub snapshot_failures: u64,
}

/// Result of processing one dequeued batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: usize,
    pub skipped: usize,
}

pub struct Consumer<Q, L> {
    queue: Q,
    log: L,
    config: ConsumerConfig,
    snapshot: SnapshotWriter,
    buffer: Vec<CanonicalRecord>,
    stats: ConsumerStats,
    state: ConsumerState,
}

impl<Q, L> Consumer<Q, L>
where
    Q: IngestionQueue,
    L: OutputLog,
{
    pub fn new(queue: Q, log: L, config: ConsumerConfig) -> Self {
        let snapshot = SnapshotWriter::new(config.snapshot_file.clone());
        Self {
            queue,
            log,
            config,
            snapshot,
            buffer: Vec::new(),
            stats: ConsumerStats::default(),
            state: ConsumerState::Idle,
        }
    }

    pub fn stats(&self) -> &ConsumerStats {
        &self.stats
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Records waiting for the next snapshot flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Run forever
    pub async fn run(&mut self) -> anyhow::Result<()> {
        info!(
            "Consumer started (pop_batch={}, snapshot_every={}, snapshot_file={:?})",
            self.config.pop_batch, self.config.snapshot_every, self.config.snapshot_file
        );

        loop {
            match self.poll_once().await {
                Ok(ConsumerState::Draining) => continue,
                Ok(ConsumerState::Idle) => {}
                Err(e) => error!("Batch failed, records from this batch are lost: {}", e),
            }
            tokio::time::sleep(self.config.idle_interval()).await;
        }
    }

    /// One state transition: dequeue a batch and process it if there is one
    pub async fn poll_once(&mut self) -> Result<ConsumerState, QueueError> {
        let items = match self.queue.dequeue_batch(self.config.pop_batch).await {
            Ok(items) => items,
            Err(e) => {
                self.state = ConsumerState::Idle;
                return Err(e);
            }
        };

        if items.is_empty() {
            if self.state == ConsumerState::Draining {
                debug!("Queue drained, going idle");
            }
            self.state = ConsumerState::Idle;
            return Ok(self.state);
        }

        self.state = ConsumerState::Draining;
        self.process_batch(&items, unix_now()).await?;
        Ok(self.state)
    }

    /// Enrich and publish one dequeued batch.
    ///
    /// Malformed items are counted and dropped. Valid records are appended to the
    /// output log in dequeue order with a single atomic write; if that write
    /// fails the whole batch is lost and the error is returned.
    pub async fn process_batch(&mut self, items: &[String], received_at: i64) -> Result<BatchOutcome, QueueError> {
        let mut records = Vec::with_capacity(items.len());
        let mut skipped = 0usize;

        for raw in items {
            match enrich_raw(raw, received_at) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping invalid queue item: {} (payload: {:.120})", e, raw);
                }
            }
        }
        self.stats.skipped += skipped as u64;

        if !records.is_empty() {
            self.log.append_batch(&records).await?;
        }

        let before = self.stats.processed;
        self.stats.processed += records.len() as u64;
        self.log_progress(before);

        let outcome = BatchOutcome { processed: records.len(), skipped };
        self.buffer.extend(records);
        if self.buffer.len() >= self.config.snapshot_every {
            self.flush_snapshot();
        }

        Ok(outcome)
    }

    /// Write the buffer to the snapshot file. The buffer is cleared even when the
    /// write fails; the output log already holds these records.
    pub fn flush_snapshot(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let records = std::mem::take(&mut self.buffer);
        match self.snapshot.append(&records) {
            Ok(written) => {
                self.stats.snapshot_records_written += written as u64;
                info!("Wrote {} records to snapshot {:?}", written, self.snapshot.path());
            }
            Err(e) => {
                self.stats.snapshot_failures += 1;
                warn!("Snapshot write to {:?} failed, {} records not mirrored: {}", self.snapshot.path(), records.len(), e);
            }
        }
    }

    fn log_progress(&self, before: u64) {
        let every = self.config.progress_log_every;
        if every == 0 {
            return;
        }
        if before / every != self.stats.processed / every {
            info!(
                processed = self.stats.processed,
                skipped = self.stats.skipped,
                "Total processed: {}",
                self.stats.processed
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use franchise_core::{Metrics, RawEvent};
    use franchise_queue::{MemoryLog, MemoryQueue};
    use tempfile::TempDir;

    fn config(temp_dir: &TempDir, pop_batch: usize, snapshot_every: usize) -> ConsumerConfig {
        ConsumerConfig {
            pop_batch,
            snapshot_every,
            snapshot_file: temp_dir.path().join("snapshot.ndjson"),
            idle_interval_ms: 10,
            progress_log_every: 1000,
        }
    }

    fn event(title: &str, hype: f64) -> RawEvent {
        let metrics = Metrics { hype_score: Some(hype), imdb_rating: Some(8.0), ..Metrics::default() };
        RawEvent::new(1_700_000_000, title, metrics)
    }

    #[tokio::test]
    async fn test_malformed_item_is_skipped_and_not_published() {
        let temp_dir = TempDir::new().unwrap();
        let log = MemoryLog::new();
        let mut consumer = Consumer::new(MemoryQueue::new(), log.clone(), config(&temp_dir, 10, 100));

        let outcome = consumer.process_batch(&["not json at all".to_string()], 0).await.unwrap();

        assert_eq!(outcome, BatchOutcome { processed: 0, skipped: 1 });
        assert_eq!(consumer.stats().skipped, 1);
        assert!(log.entries().is_empty());
    }

    #[tokio::test]
    async fn test_batch_keeps_dequeue_order_around_bad_items() {
        let temp_dir = TempDir::new().unwrap();
        let log = MemoryLog::new();
        let mut consumer = Consumer::new(MemoryQueue::new(), log.clone(), config(&temp_dir, 10, 100));

        let items = vec![
            event("A", 10.0).to_json().unwrap(),
            r#"{"timestamp": 1, "metrics": {}}"#.to_string(),
            event("B", 20.0).to_json().unwrap(),
        ];
        let outcome = consumer.process_batch(&items, 0).await.unwrap();

        assert_eq!(outcome, BatchOutcome { processed: 2, skipped: 1 });
        let titles: Vec<String> = log.records().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["A", "B"]);
        assert_eq!(log.records()[0].engagement_score, 8.0);
    }

    #[tokio::test]
    async fn test_huge_hype_is_published_decodable() {
        let temp_dir = TempDir::new().unwrap();
        let log = MemoryLog::new();
        let mut consumer = Consumer::new(MemoryQueue::new(), log.clone(), config(&temp_dir, 10, 100));

        let items =
            vec![r#"{"timestamp": 1, "title": "Big", "metrics": {"hype_score": 1e306, "imdb_rating": 8.0}}"#.to_string()];
        let outcome = consumer.process_batch(&items, 0).await.unwrap();

        assert_eq!(outcome, BatchOutcome { processed: 1, skipped: 0 });
        assert_eq!(log.entries().len(), 1);
        assert!(!log.entries()[0].contains("null"));

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].hype_score, 1e306);
        assert!(records[0].engagement_score.is_finite());
    }

    #[tokio::test]
    async fn test_untimed_event_gets_receive_time() {
        let temp_dir = TempDir::new().unwrap();
        let log = MemoryLog::new();
        let mut consumer = Consumer::new(MemoryQueue::new(), log.clone(), config(&temp_dir, 10, 100));

        let items = vec![r#"{"title": "X", "metrics": {"hype_score": "12.5"}}"#.to_string()];
        consumer.process_batch(&items, 1_234).await.unwrap();

        let record = &log.records()[0];
        assert_eq!(record.timestamp, 1_234);
        assert_eq!(record.hype_score, 12.5);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let temp_dir = TempDir::new().unwrap();
        let queue = MemoryQueue::new();
        let log = MemoryLog::new();
        let mut consumer = Consumer::new(queue.clone(), log.clone(), config(&temp_dir, 2, 100));

        assert_eq!(consumer.poll_once().await.unwrap(), ConsumerState::Idle);

        queue.enqueue_batch(&[event("A", 1.0), event("B", 2.0), event("C", 3.0)]).await.unwrap();
        assert_eq!(consumer.poll_once().await.unwrap(), ConsumerState::Draining);
        assert_eq!(consumer.poll_once().await.unwrap(), ConsumerState::Draining);
        assert_eq!(consumer.poll_once().await.unwrap(), ConsumerState::Idle);

        assert_eq!(consumer.stats().processed, 3);
        assert_eq!(log.len().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_flushes_at_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let queue = MemoryQueue::new();
        let mut consumer = Consumer::new(queue.clone(), MemoryLog::new(), config(&temp_dir, 2, 3));

        queue.enqueue_batch(&[event("A", 1.0), event("B", 2.0), event("C", 3.0), event("D", 4.0)]).await.unwrap();
        consumer.poll_once().await.unwrap();
        assert_eq!(consumer.buffered(), 2);
        assert!(!temp_dir.path().join("snapshot.ndjson").exists());

        consumer.poll_once().await.unwrap();
        assert_eq!(consumer.buffered(), 0);
        assert_eq!(consumer.stats().snapshot_records_written, 4);

        let content = std::fs::read_to_string(temp_dir.path().join("snapshot.ndjson")).unwrap();
        assert_eq!(content.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_snapshot_failure_does_not_block_publishing() {
        let temp_dir = TempDir::new().unwrap();
        let log = MemoryLog::new();
        let mut cfg = config(&temp_dir, 10, 1);
        // A directory path cannot be opened as the snapshot file
        cfg.snapshot_file = temp_dir.path().to_path_buf();
        let mut consumer = Consumer::new(MemoryQueue::new(), log.clone(), cfg);

        consumer.process_batch(&[event("A", 1.0).to_json().unwrap()], 0).await.unwrap();

        assert_eq!(log.len().await.unwrap(), 1);
        assert_eq!(consumer.stats().snapshot_failures, 1);
        assert_eq!(consumer.buffered(), 0);
    }

    #[tokio::test]
    async fn test_append_failure_is_fatal_to_the_batch() {
        let temp_dir = TempDir::new().unwrap();
        let queue = MemoryQueue::new();
        let log = MemoryLog::new();
        let mut consumer = Consumer::new(queue.clone(), log.clone(), config(&temp_dir, 10, 100));

        queue.enqueue(&event("A", 1.0)).await.unwrap();
        log.set_unavailable(true);

        assert!(consumer.poll_once().await.is_err());
        assert_eq!(consumer.stats().processed, 0);
        // Dequeued items are gone even though the append failed
        assert_eq!(queue.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_queue_reports_error() {
        let temp_dir = TempDir::new().unwrap();
        let queue = MemoryQueue::new();
        queue.set_unavailable(true);
        let mut consumer = Consumer::new(queue, MemoryLog::new(), config(&temp_dir, 10, 100));

        assert!(matches!(consumer.poll_once().await, Err(QueueError::Unavailable(_))));
        assert_eq!(consumer.state(), ConsumerState::Idle);
    }
}
