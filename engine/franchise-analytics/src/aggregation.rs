//! # Record Aggregation
//!
//! Pure functions from a slice of output-log records to dashboard tables.
//! Grouping is by `title` and always keeps first-seen order, so every sort
//! applied afterwards is stable with respect to the log.

use franchise_core::CanonicalRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::lifecycle::{dominant, lifecycles, Lifecycle};
use crate::metric::Metric;

/// Headline numbers for the status view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_points: usize,
    pub unique_titles: usize,
    /// Newest record timestamp
    pub last_update: Option<i64>,
    pub dominant_lifecycle: Option<Lifecycle>,
}

pub fn summarize(records: &[CanonicalRecord]) -> Summary {
    let rows = lifecycles(records);
    Summary {
        total_points: records.len(),
        unique_titles: rows.len(),
        last_update: records.iter().map(|r| r.timestamp).max(),
        dominant_lifecycle: dominant(&rows),
    }
}

/// One leaderboard line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    pub title: String,
    /// Mean of the ranking metric
    pub score: f64,
    pub mean_hype: f64,
    pub mean_netflix_hours: f64,
    pub mean_engagement: f64,
    pub max_brand_equity: i64,
    pub samples: usize,
    pub lifecycle: Lifecycle,
}

#[derive(Default)]
struct TitleAccumulator<'a> {
    title: &'a str,
    samples: usize,
    hype_sum: f64,
    hours_sum: f64,
    engagement_sum: f64,
    max_brand_equity: i64,
    metric_sum: f64,
    metric_samples: usize,
}

/// Titles ranked by the mean of `metric`, highest first, at most `top_n` rows.
///
/// Equal means keep first-seen order. Titles with no value for the metric
/// (an all-unknown rating) are left out.
pub fn leaderboard(records: &[CanonicalRecord], metric: Metric, top_n: usize) -> Vec<LeaderboardRow> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<TitleAccumulator<'_>> = Vec::new();

    for record in records {
        let i = *index.entry(record.title.as_str()).or_insert_with(|| {
            groups.push(TitleAccumulator {
                title: record.title.as_str(),
                max_brand_equity: i64::MIN,
                ..TitleAccumulator::default()
            });
            groups.len() - 1
        });

        let group = &mut groups[i];
        group.samples += 1;
        group.hype_sum += record.hype_score;
        group.hours_sum += record.netflix_hours;
        group.engagement_sum += record.engagement_score;
        group.max_brand_equity = group.max_brand_equity.max(record.brand_equity);
        if let Some(value) = metric.value(record) {
            group.metric_sum += value;
            group.metric_samples += 1;
        }
    }

    let lifecycle_by_title: HashMap<String, Lifecycle> =
        lifecycles(records).into_iter().map(|row| (row.title, row.lifecycle)).collect();

    let mut rows: Vec<LeaderboardRow> = groups
        .into_iter()
        .filter(|g| g.metric_samples > 0)
        .map(|g| {
            let n = g.samples as f64;
            LeaderboardRow {
                title: g.title.to_string(),
                score: g.metric_sum / g.metric_samples as f64,
                mean_hype: g.hype_sum / n,
                mean_netflix_hours: g.hours_sum / n,
                mean_engagement: g.engagement_sum / n,
                max_brand_equity: g.max_brand_equity,
                samples: g.samples,
                lifecycle: lifecycle_by_title.get(g.title).copied().unwrap_or(Lifecycle::NotApplicable),
            }
        })
        .collect();

    // sort_by is stable
    rows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    rows.truncate(top_n);
    rows
}

/// Mean of a metric inside one time bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Bucket start, aligned to the epoch
    pub bucket_start: i64,
    pub value: f64,
    pub samples: usize,
}

/// `metric` for one title, averaged per `bucket_secs` bucket, buckets ascending
pub fn time_series(records: &[CanonicalRecord], title: &str, metric: Metric, bucket_secs: i64) -> Vec<SeriesPoint> {
    let width = bucket_secs.max(1);
    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();

    for record in records.iter().filter(|r| r.title == title) {
        if let Some(value) = metric.value(record) {
            let bucket_start = record.timestamp.div_euclid(width).saturating_mul(width);
            let entry = buckets.entry(bucket_start).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(bucket_start, (sum, samples))| SeriesPoint { bucket_start, value: sum / samples as f64, samples })
        .collect()
}

/// Box-plot statistics of hype for one title
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityRow {
    pub title: String,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub samples: usize,
}

impl VolatilityRow {
    pub fn spread(&self) -> f64 {
        self.max - self.min
    }
}

/// Hype distribution per title, in first-seen order
pub fn volatility(records: &[CanonicalRecord]) -> Vec<VolatilityRow> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<f64>)> = Vec::new();

    for record in records {
        let i = *index.entry(record.title.as_str()).or_insert_with(|| {
            groups.push((record.title.as_str(), Vec::new()));
            groups.len() - 1
        });
        groups[i].1.push(record.hype_score);
    }

    groups
        .into_iter()
        .map(|(title, mut values)| {
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            VolatilityRow {
                title: title.to_string(),
                min: values[0],
                q1: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q3: quantile(&values, 0.75),
                max: values[values.len() - 1],
                samples: values.len(),
            }
        })
        .collect()
}

/// Linear-interpolation quantile of an ascending, non-empty slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
