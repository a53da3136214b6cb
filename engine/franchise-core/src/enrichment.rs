//! Enrichment: RawEvent -> CanonicalRecord.
//!
//! Every record is a pure function of exactly one event. Nothing here reads the
//! clock or keeps counters, so a batch can be enriched in any order or in
//! parallel and enriching the same event twice yields identical records.

use crate::error::{EventError, Result};
use crate::events::{CanonicalRecord, RawEvent};

/// Rating used by the engagement formula when the real rating is unknown
pub const NEUTRAL_RATING: f64 = 5.0;

/// Decimal places kept for `hype_score`
pub const HYPE_PRECISION: i32 = 3;

/// Decimal places kept for `engagement_score`
pub const ENGAGEMENT_PRECISION: i32 = 4;

/// Round half away from zero to `places` decimal places.
///
/// Values too large to scale are already integral at that precision and come
/// back unchanged.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// Demand discounted or boosted by quality.
///
/// A missing rating and a rating of exactly zero both count as unknown and use
/// the neutral rating.
pub fn engagement_score(hype_score: f64, imdb_rating: Option<f64>) -> f64 {
    let rating = imdb_rating.filter(|r| *r != 0.0 && r.is_finite()).unwrap_or(NEUTRAL_RATING);
    let score = hype_score * (rating / 10.0);
    if score.is_nan() {
        return 0.0;
    }
    // JSON has no infinity
    round_to(score.clamp(f64::MIN, f64::MAX), ENGAGEMENT_PRECISION)
}

/// Apply defaults, coercion and derivation to one event
pub fn enrich(event: &RawEvent) -> Result<CanonicalRecord> {
    let title = event.resolved_title().ok_or(EventError::MissingTitle)?;
    let timestamp = event.timestamp.ok_or(EventError::MissingTimestamp)?;
    let metrics = &event.metrics;

    let hype = metrics.hype_score.filter(|h| h.is_finite()).unwrap_or(0.0);
    let imdb_rating = metrics.imdb_rating;

    Ok(CanonicalRecord {
        timestamp,
        title: title.to_string(),
        hype_score: round_to(hype, HYPE_PRECISION),
        brand_equity: metrics.brand_equity.unwrap_or(0),
        imdb_rating,
        netflix_hours: metrics.netflix_hours.unwrap_or(0.0),
        engagement_score: engagement_score(hype, imdb_rating),
    })
}

/// Parse and enrich one queue entry, stamping `received_at` on untimed events
pub fn enrich_raw(raw: &str, received_at: i64) -> Result<CanonicalRecord> {
    let mut event = RawEvent::parse(raw)?;
    event.stamp_if_missing(received_at);
    enrich(&event)
}
