//! # Trends Producer
//!
//! Polls external sources for a list of tracked titles and feeds the ingestion
//! queue. Titles are queried in batches on a bounded worker pool; every call
//! goes through a retry policy and a shared circuit breaker, and a failed batch
//! falls back to the last values fetched for its titles.

pub mod error;
pub mod producer;
pub mod retry;
pub mod sources;
pub mod titles;

pub use error::{Result, SourceError};
pub use producer::{BackfillReport, CycleReport, HypeOrigin, Producer};
pub use retry::{CircuitBreaker, CircuitState, RetryPolicy};
pub use sources::{DisabledSource, HistoryPoint, HttpTrendSource, MetadataCatalog, MetricSource, TitleMetadata};
pub use titles::{chunk_titles, load_titles, CURATED_TITLES};
