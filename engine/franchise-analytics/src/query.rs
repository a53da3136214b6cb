//! # Log Reader
//!
//! Cached full reads of the output log for the dashboard.

use franchise_core::config::DashboardConfig;
use franchise_core::CanonicalRecord;
use franchise_queue::OutputLog;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What a dashboard refresh has to work with
#[derive(Debug, Clone)]
pub enum DashboardData {
    /// Newest records, oldest first
    Ready(Arc<Vec<CanonicalRecord>>),
    /// The log is empty or holds nothing parseable
    Empty,
    /// The store could not be read
    Failed(String),
}

impl DashboardData {
    /// Records to aggregate; empty for the waiting and error states
    pub fn records(&self) -> &[CanonicalRecord] {
        match self {
            DashboardData::Ready(records) => records.as_slice(),
            DashboardData::Empty | DashboardData::Failed(_) => &[],
        }
    }
}

struct CachedRead {
    fetched_at: Instant,
    data: DashboardData,
}

/// Reads at most `max_read` newest records, reusing a result for `ttl`.
///
/// Failed reads are not cached so the next refresh retries the store.
pub struct LogReader<L> {
    log: L,
    max_read: usize,
    ttl: Duration,
    cache: Mutex<Option<CachedRead>>,
}

impl<L: OutputLog> LogReader<L> {
    pub fn new(log: L, config: &DashboardConfig) -> Self {
        Self::with_limits(log, config.max_read, config.cache_ttl())
    }

    pub fn with_limits(log: L, max_read: usize, ttl: Duration) -> Self {
        Self { log, max_read, ttl, cache: Mutex::new(None) }
    }

    pub async fn read(&self) -> DashboardData {
        if let Some(cached) = self.cache.lock().as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.data.clone();
            }
        }

        let data = self.read_uncached().await;
        if !matches!(data, DashboardData::Failed(_)) {
            *self.cache.lock() = Some(CachedRead { fetched_at: Instant::now(), data: data.clone() });
        }
        data
    }

    /// Drop the cached result so the next read hits the store
    pub fn invalidate(&self) {
        *self.cache.lock() = None;
    }

    async fn read_uncached(&self) -> DashboardData {
        let entries = match self.log.read_tail(self.max_read).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read output log: {}", e);
                return DashboardData::Failed(e.to_string());
            }
        };

        let total = entries.len();
        let records: Vec<CanonicalRecord> =
            entries.iter().filter_map(|raw| CanonicalRecord::from_json(raw).ok()).collect();
        if records.len() < total {
            debug!("Skipped {} unparsable output log entries", total - records.len());
        }

        if records.is_empty() {
            DashboardData::Empty
        } else {
            DashboardData::Ready(Arc::new(records))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use franchise_queue::MemoryLog;

    fn record(title: &str, timestamp: i64) -> CanonicalRecord {
        CanonicalRecord {
            timestamp,
            title: title.to_string(),
            hype_score: 1.0,
            brand_equity: 0,
            imdb_rating: None,
            netflix_hours: 0.0,
            engagement_score: 0.5,
        }
    }

    #[tokio::test]
    async fn test_empty_log_is_waiting_state() {
        let reader = LogReader::with_limits(MemoryLog::new(), 100, Duration::ZERO);
        assert!(matches!(reader.read().await, DashboardData::Empty));
        assert!(reader.read().await.records().is_empty());
    }

    #[tokio::test]
    async fn test_read_keeps_newest_and_skips_garbage() {
        let log = MemoryLog::new();
        log.append_batch(&[record("A", 1), record("B", 2)]).await.unwrap();
        log.append_raw(&["{broken".to_string()]).await.unwrap();
        log.append_batch(&[record("C", 3)]).await.unwrap();

        let reader = LogReader::with_limits(log, 3, Duration::ZERO);
        let data = reader.read().await;
        let titles: Vec<&str> = data.records().iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["B", "C"]);
    }

    #[tokio::test]
    async fn test_cached_result_reused_within_ttl() {
        let log = MemoryLog::new();
        log.append_batch(&[record("A", 1)]).await.unwrap();
        let reader = LogReader::with_limits(log.clone(), 100, Duration::from_secs(60));

        assert_eq!(reader.read().await.records().len(), 1);
        log.append_batch(&[record("B", 2)]).await.unwrap();
        assert_eq!(reader.read().await.records().len(), 1);

        reader.invalidate();
        assert_eq!(reader.read().await.records().len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_and_not_cached() {
        let log = MemoryLog::new();
        log.append_batch(&[record("A", 1)]).await.unwrap();
        log.set_unavailable(true);
        let reader = LogReader::with_limits(log.clone(), 100, Duration::from_secs(60));

        let data = reader.read().await;
        assert!(matches!(data, DashboardData::Failed(_)));
        assert!(data.records().is_empty());

        log.set_unavailable(false);
        assert_eq!(reader.read().await.records().len(), 1);
    }
}
