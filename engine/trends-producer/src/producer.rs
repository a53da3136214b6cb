//! Polling cycle and history backfill.
//!
//! Each cycle stamps one timestamp, looks up what is trending right now,
//! fetches interest for every title batch on a bounded set of concurrent
//! workers, merges in static metadata and pushes one RawEvent per title. Batches
//! are enqueued as they complete, each with a single atomic push.
//!
//! Backfill runs once: every title's full interest history becomes one RawEvent
//! per point, stamped with the point's own time and pushed atomically per title.

use franchise_core::config::ProducerConfig;
use franchise_core::enrichment::HYPE_PRECISION;
use franchise_core::{round_to, unix_now, Metrics, RawEvent};
use franchise_queue::IngestionQueue;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::Result as SourceResult;
use crate::retry::{CircuitBreaker, RetryPolicy};
use crate::sources::{HistoryPoint, MetadataCatalog, MetricSource};
use crate::titles::chunk_titles;

/// How the hype value of an event was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypeOrigin {
    Fresh,
    /// Batch failed; last successful value reused
    LastKnown,
    /// Batch failed and nothing was ever fetched for the title
    Fallback,
}

/// Totals for one polling cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub batches: usize,
    /// Batches whose fetch failed after retries or hit an open circuit
    pub failed_fetches: usize,
    /// Batches whose events could not be enqueued
    pub dropped_batches: usize,
    pub events_enqueued: usize,
}

/// Totals for one backfill run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub titles: usize,
    /// Titles whose history fetch failed after retries or hit an open circuit
    pub failed_fetches: usize,
    /// Titles the provider had no history for
    pub empty_titles: usize,
    /// Titles whose events could not be enqueued
    pub dropped_titles: usize,
    pub events_enqueued: usize,
}

pub struct Producer<Q> {
    queue: Q,
    source: Arc<dyn MetricSource>,
    metadata: Arc<MetadataCatalog>,
    policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
    config: ProducerConfig,
    titles: Vec<String>,
    batches: Vec<Vec<String>>,
    last_known: Mutex<HashMap<String, f64>>,
}

impl<Q: IngestionQueue> Producer<Q> {
    pub fn new(
        queue: Q,
        source: Arc<dyn MetricSource>,
        metadata: Arc<MetadataCatalog>,
        policy: RetryPolicy,
        breaker: Arc<CircuitBreaker>,
        titles: &[String],
        config: ProducerConfig,
    ) -> Self {
        let batches = chunk_titles(titles, config.batch_size);
        info!(
            "Prepared {} batches for {} titles (batch_size={}, workers={})",
            batches.len(),
            titles.len(),
            config.batch_size,
            config.max_workers
        );

        Self {
            queue,
            source,
            metadata,
            policy,
            breaker,
            config,
            titles: titles.to_vec(),
            batches,
            last_known: Mutex::new(HashMap::new()),
        }
    }

    /// Run cycles forever, once when `run_once` is set, or a single backfill
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Producer started with source {}", self.source.name());
        if self.config.backfill {
            let report = self.run_backfill().await;
            info!(
                titles = report.titles,
                failed = report.failed_fetches,
                empty = report.empty_titles,
                dropped = report.dropped_titles,
                "Backfill complete: {} events enqueued",
                report.events_enqueued
            );
            return Ok(());
        }

        loop {
            let report = self.run_cycle().await;
            info!(
                batches = report.batches,
                failed = report.failed_fetches,
                dropped = report.dropped_batches,
                "Cycle complete: {} events enqueued",
                report.events_enqueued
            );

            if self.config.run_once {
                return Ok(());
            }
            info!("Sleeping {:?} before next update", self.config.cycle_sleep());
            sleep(self.config.cycle_sleep()).await;
        }
    }

    /// One polling cycle over every batch
    pub async fn run_cycle(&self) -> CycleReport {
        let timestamp = unix_now();
        let trending = self.current_trending().await;
        let mut report = CycleReport { batches: self.batches.len(), ..CycleReport::default() };

        let mut completed = stream::iter(self.batches.iter())
            .map(|batch| async move { (batch, self.fetch_batch(batch).await) })
            .buffer_unordered(self.config.max_workers.max(1));

        while let Some((batch, fetched)) = completed.next().await {
            if fetched.is_err() {
                report.failed_fetches += 1;
            }

            let events = self.build_events(batch, timestamp, fetched, &trending);
            match self.queue.enqueue_batch(&events).await {
                Ok(queue_len) => {
                    report.events_enqueued += events.len();
                    info!(
                        "Pushed {} events for batch (first title: {}, queue length {})",
                        events.len(),
                        batch.first().map(String::as_str).unwrap_or("n/a"),
                        queue_len
                    );
                }
                Err(e) => {
                    report.dropped_batches += 1;
                    warn!("Dropping batch of {} events, enqueue failed: {}", events.len(), e);
                }
            }
        }

        report
    }

    /// Replay every title's interest history once
    pub async fn run_backfill(&self) -> BackfillReport {
        let mut report = BackfillReport { titles: self.titles.len(), ..BackfillReport::default() };
        info!("Starting backfill for {} titles ({})", self.titles.len(), self.config.backfill_timeframe);

        let mut completed = stream::iter(self.titles.iter())
            .map(|title| async move { (title, self.fetch_history(title).await) })
            .buffer_unordered(self.config.max_workers.max(1));

        while let Some((title, fetched)) = completed.next().await {
            let history = match fetched {
                Ok(history) => history,
                Err(_) => {
                    report.failed_fetches += 1;
                    continue;
                }
            };
            if history.is_empty() {
                report.empty_titles += 1;
                warn!("No trend history found for {}", title);
                continue;
            }

            let events: Vec<RawEvent> = history.iter().map(|point| self.history_event(title, point)).collect();
            match self.queue.enqueue_batch(&events).await {
                Ok(queue_len) => {
                    report.events_enqueued += events.len();
                    info!("Pushed {} history events for {} (queue length {})", events.len(), title, queue_len);
                }
                Err(e) => {
                    report.dropped_titles += 1;
                    warn!("Dropping {} history events for {}, enqueue failed: {}", events.len(), title, e);
                }
            }
        }

        report
    }

    /// Lowercased titles trending right now; empty when the lookup fails
    async fn current_trending(&self) -> HashSet<String> {
        match self.source.fetch_trending().await {
            Ok(titles) => titles.iter().map(|t| t.trim().to_lowercase()).collect(),
            Err(e) => {
                info!("Trending context unavailable ({}), skipping", e);
                HashSet::new()
            }
        }
    }

    async fn fetch_history(&self, title: &str) -> SourceResult<Vec<HistoryPoint>> {
        let label = format!("{} history for {}", self.source.name(), title);
        let result = self.policy.run(&self.breaker, &label, || self.source.fetch_history(title)).await;
        if let Err(e) = &result {
            warn!("History fetch failed for {}: {}", title, e);
        }
        sleep(self.config.inter_call_delay()).await;
        result
    }

    /// One upstream call (with retries) followed by the mandatory pause
    async fn fetch_batch(&self, batch: &[String]) -> SourceResult<HashMap<String, f64>> {
        let label = format!("{} batch starting {:?}", self.source.name(), batch.first());
        let result = self.policy.run(&self.breaker, &label, || self.source.fetch_interest(batch)).await;
        if let Err(e) = &result {
            warn!("Fetch failed for {:?}, using last known values: {}", batch, e);
        }
        sleep(self.config.inter_call_delay()).await;
        result
    }

    fn build_events(
        &self,
        batch: &[String],
        timestamp: i64,
        fetched: SourceResult<HashMap<String, f64>>,
        trending: &HashSet<String>,
    ) -> Vec<RawEvent> {
        let mut last_known = self.last_known.lock();
        batch
            .iter()
            .map(|title| {
                let (hype, origin) = match &fetched {
                    Ok(values) => {
                        let hype = values.get(title).copied().unwrap_or(0.0);
                        last_known.insert(title.clone(), hype);
                        (hype, HypeOrigin::Fresh)
                    }
                    Err(_) => match last_known.get(title) {
                        Some(&hype) => (hype, HypeOrigin::LastKnown),
                        None => (0.0, HypeOrigin::Fallback),
                    },
                };
                debug!("{}: hype {} ({:?})", title, hype, origin);
                let is_trending = trending.contains(&title.trim().to_lowercase());
                let metrics = self.metrics_for(title, hype).with_extra("is_trending", is_trending);
                RawEvent::new(timestamp, title.as_str(), metrics)
            })
            .collect()
    }

    fn history_event(&self, title: &str, point: &HistoryPoint) -> RawEvent {
        RawEvent::new(point.timestamp, title, self.metrics_for(title, point.hype))
    }

    fn metrics_for(&self, title: &str, hype: f64) -> Metrics {
        let meta = self.metadata.get(title).cloned().unwrap_or_default();
        Metrics {
            hype_score: Some(round_to(hype, HYPE_PRECISION)),
            brand_equity: meta.brand_equity,
            imdb_rating: meta.imdb_rating,
            netflix_hours: Some(meta.netflix_hours.unwrap_or(0.0)),
            cost_basis: Some(1),
            ..Metrics::default()
        }
    }

    /// Last successfully fetched hype per title
    pub fn last_known(&self, title: &str) -> Option<f64> {
        self.last_known.lock().get(title).copied()
    }
}
