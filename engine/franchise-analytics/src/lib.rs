//! # Franchise Analytics
//!
//! Read-only view over the output log. A cached `LogReader` pulls the newest
//! records, and the aggregation modules turn them into the dashboard tables:
//! summary KPIs, per-title leaderboard, bucketed time series, lifecycle
//! (peaker) classification, volatility statistics and an OLS regression of
//! viewing hours on hype.

pub mod aggregation;
pub mod cli;
pub mod lifecycle;
pub mod metric;
pub mod query;
pub mod regression;

pub use aggregation::{leaderboard, summarize, time_series, volatility, LeaderboardRow, SeriesPoint, Summary, VolatilityRow};
pub use lifecycle::{classify, dominant, lifecycles, Lifecycle, TitleLifecycle};
pub use metric::Metric;
pub use query::{DashboardData, LogReader};
pub use regression::{fit_ols, hype_vs_hours, regression_dataset, LinearModel, RegressionOutcome};
