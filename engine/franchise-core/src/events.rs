//! Wire types for the ingestion pipeline.
//!
//! A `RawEvent` is one JSON object per ingestion-queue entry. Producers build it
//! from whatever their upstream returned, so parsing is deliberately lenient:
//! metric values may be numbers, numeric strings or null, and anything else is
//! treated as absent. A `CanonicalRecord` is one JSON object per output-log
//! entry and is strictly typed.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{EventError, Result};

/// Measurements attached to a raw event.
///
/// Known metrics are explicit optional fields; anything else a producer adds
/// (for example `is_trending`) is kept in `extra` and survives a round trip.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// Search-interest index, typically 0-100
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub hype_score: Option<f64>,

    /// Cumulative audience vote count
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub brand_equity: Option<i64>,

    /// Rating on a 0-10 scale
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub imdb_rating: Option<f64>,

    /// Viewing hours attributable to the observation period
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub netflix_hours: Option<f64>,

    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub active_watchers: Option<i64>,

    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub total_plays: Option<i64>,

    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub cost_basis: Option<i64>,

    /// Forward-compatible extension metrics
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metrics {
    /// Title carried inside the metrics map, used when the event has no top-level title
    pub fn title_hint(&self) -> Option<&str> {
        self.extra.get("title").and_then(Value::as_str)
    }

    /// Attach an extension metric
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Producer output and ingestion-queue payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Seconds since epoch; float sources are truncated
    #[serde(default, deserialize_with = "lenient_timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    /// Tracked entity, the grouping key downstream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, deserialize_with = "nullable_metrics")]
    pub metrics: Metrics,
}

impl RawEvent {
    /// Build a fully populated event, as producers do
    pub fn new(timestamp: i64, title: impl Into<String>, metrics: Metrics) -> Self {
        Self { timestamp: Some(timestamp), title: Some(title.into()), metrics }
    }

    /// Decode one queue entry
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(EventError::Malformed)
    }

    /// Encode for the queue wire format
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(EventError::Serialize)
    }

    /// The grouping key: top-level `title`, else `metrics.title`, ignoring blanks
    pub fn resolved_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.metrics.title_hint().filter(|t| !t.trim().is_empty()))
    }

    /// Fill in a receive time for events that arrived without one
    pub fn stamp_if_missing(&mut self, received_at: i64) {
        self.timestamp.get_or_insert(received_at);
    }
}

/// Consumer output and output-log payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub timestamp: i64,
    pub title: String,
    /// Rounded to 3 decimal places
    #[serde(default)]
    pub hype_score: f64,
    #[serde(default)]
    pub brand_equity: i64,
    #[serde(default)]
    pub imdb_rating: Option<f64>,
    #[serde(default)]
    pub netflix_hours: f64,
    /// Rounded to 4 decimal places
    #[serde(default)]
    pub engagement_score: f64,
}

impl CanonicalRecord {
    /// Decode one output-log entry
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(EventError::Malformed)
    }

    /// Encode for the output log and snapshot file
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(EventError::Serialize)
    }
}

/// Interpret a JSON value as a float: numbers and numeric strings only
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Interpret a JSON value as an integer, truncating fractional input
pub fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| coerce_f64(value).map(|v| v.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().or_else(|| coerce_f64(value).map(|v| v.trunc() as i64)),
        _ => None,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_f64(&value))
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_i64(&value))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_f64(&value).map(|v| v.trunc() as i64))
}

fn nullable_metrics<'de, D>(deserializer: D) -> std::result::Result<Metrics, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Metrics>::deserialize(deserializer)?.unwrap_or_default())
}
