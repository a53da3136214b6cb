//! Record metrics selectable on the dashboard

use clap::ValueEnum;
use franchise_core::CanonicalRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[value(name = "hype_score", alias = "hype")]
    HypeScore,
    #[value(name = "netflix_hours", alias = "hours")]
    NetflixHours,
    #[value(name = "engagement_score", alias = "engagement")]
    EngagementScore,
    #[value(name = "brand_equity", alias = "votes")]
    BrandEquity,
    #[value(name = "imdb_rating", alias = "rating")]
    ImdbRating,
}

impl Metric {
    /// Value carried by `record`; an unknown rating has no value
    pub fn value(self, record: &CanonicalRecord) -> Option<f64> {
        match self {
            Metric::HypeScore => Some(record.hype_score),
            Metric::NetflixHours => Some(record.netflix_hours),
            Metric::EngagementScore => Some(record.engagement_score),
            Metric::BrandEquity => Some(record.brand_equity as f64),
            Metric::ImdbRating => record.imdb_rating,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::HypeScore => "hype_score",
            Metric::NetflixHours => "netflix_hours",
            Metric::EngagementScore => "engagement_score",
            Metric::BrandEquity => "brand_equity",
            Metric::ImdbRating => "imdb_rating",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
