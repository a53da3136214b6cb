//! Peaker classification.
//!
//! A title's lifecycle is the relative position of its hype peak within its
//! observed history: 0.0 is the first observation, 1.0 the latest.

use franchise_core::CanonicalRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

const EARLY_BOUNDARY: f64 = 0.33;
const MID_BOUNDARY: f64 = 0.66;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Lifecycle {
    Early,
    Mid,
    Late,
    /// All observations share one timestamp
    Instant,
    /// Hype never rose above zero
    NotApplicable,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Lifecycle::Early => "Early Peaker",
            Lifecycle::Mid => "Mid Peaker",
            Lifecycle::Late => "Late Peaker",
            Lifecycle::Instant => "Instant",
            Lifecycle::NotApplicable => "N/A",
        };
        f.write_str(label)
    }
}

/// Classify one title from its observation window and peak
pub fn classify(start_ts: i64, end_ts: i64, peak_ts: i64, max_hype: f64) -> Lifecycle {
    if max_hype == 0.0 {
        return Lifecycle::NotApplicable;
    }

    // Widened so the full i64 range cannot overflow
    let duration = i128::from(end_ts) - i128::from(start_ts);
    if duration == 0 {
        return Lifecycle::Instant;
    }

    let peak_pos = (i128::from(peak_ts) - i128::from(start_ts)) as f64 / duration as f64;
    if peak_pos < EARLY_BOUNDARY {
        Lifecycle::Early
    } else if peak_pos < MID_BOUNDARY {
        Lifecycle::Mid
    } else {
        Lifecycle::Late
    }
}

/// Per-title observation window and peak
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleLifecycle {
    pub title: String,
    pub start_ts: i64,
    pub end_ts: i64,
    /// First timestamp (in log order) at which hype was maximal
    pub peak_ts: i64,
    pub max_hype: f64,
    pub lifecycle: Lifecycle,
}

/// Lifecycle of every title, in first-seen order
pub fn lifecycles(records: &[CanonicalRecord]) -> Vec<TitleLifecycle> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut rows: Vec<TitleLifecycle> = Vec::new();

    for record in records {
        match index.get(record.title.as_str()) {
            Some(&i) => {
                let row = &mut rows[i];
                row.start_ts = row.start_ts.min(record.timestamp);
                row.end_ts = row.end_ts.max(record.timestamp);
                if record.hype_score > row.max_hype {
                    row.max_hype = record.hype_score;
                    row.peak_ts = record.timestamp;
                }
            }
            None => {
                index.insert(record.title.as_str(), rows.len());
                rows.push(TitleLifecycle {
                    title: record.title.clone(),
                    start_ts: record.timestamp,
                    end_ts: record.timestamp,
                    peak_ts: record.timestamp,
                    max_hype: record.hype_score,
                    lifecycle: Lifecycle::NotApplicable,
                });
            }
        }
    }

    for row in &mut rows {
        row.lifecycle = classify(row.start_ts, row.end_ts, row.peak_ts, row.max_hype);
    }
    rows
}

/// Most common lifecycle; ties go to the earliest variant (Early before Mid...)
pub fn dominant(rows: &[TitleLifecycle]) -> Option<Lifecycle> {
    let mut counts: HashMap<Lifecycle, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.lifecycle).or_default() += 1;
    }
    counts.into_iter().max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a))).map(|(lifecycle, _)| lifecycle)
}
