//! # Franchise Core
//!
//! Shared building blocks of the franchise ingestion pipeline: the queue event
//! schema (`RawEvent`), the output log schema (`CanonicalRecord`), the
//! enrichment rules that turn one into the other, and the process-wide
//! `PipelineConfig` every component is constructed from.

pub mod config;
pub mod enrichment;
pub mod error;
pub mod events;
pub mod logging;

pub use config::PipelineConfig;
pub use enrichment::{engagement_score, enrich, enrich_raw, round_to};
pub use error::{EventError, Result};
pub use events::{CanonicalRecord, Metrics, RawEvent};
pub use logging::initialize_logging;

/// Current wall-clock time as integer seconds since the epoch
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
