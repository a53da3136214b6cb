//! # Command Line Interface
//!
//! Text dashboard over the output log.

use anyhow::Result;
use chrono::DateTime;
use clap::{Parser, Subcommand};
use franchise_core::config::DashboardConfig;
use franchise_queue::OutputLog;
use serde::Serialize;
use std::fmt::Write as _;

use crate::aggregation::{leaderboard, summarize, time_series, volatility};
use crate::lifecycle::lifecycles;
use crate::metric::Metric;
use crate::query::{DashboardData, LogReader};
use crate::regression::{hype_vs_hours, RegressionOutcome};

/// Franchise popularity dashboard
#[derive(Parser)]
#[command(name = "franchise-dashboard")]
#[command(about = "Text dashboard for the franchise popularity pipeline")]
pub struct Cli {
    /// Print tables as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override the number of newest records read (MAX_READ)
    #[arg(long, global = true)]
    pub max_read: Option<usize>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Headline numbers: data points, titles, last update, dominant lifecycle
    Status,
    /// Titles ranked by the mean of a metric
    Leaderboard {
        #[arg(long, value_enum, default_value_t = Metric::HypeScore)]
        metric: Metric,
        /// Rows to show (LEADERBOARD_TOP_N by default)
        #[arg(long)]
        top: Option<usize>,
    },
    /// Bucketed time series for selected titles
    Series {
        /// Titles to plot
        #[arg(required = true)]
        titles: Vec<String>,
        #[arg(long, value_enum, default_value_t = Metric::HypeScore)]
        metric: Metric,
        /// Bucket width in seconds (SERIES_BUCKET_SECS by default)
        #[arg(long)]
        bucket_secs: Option<i64>,
    },
    /// Linear regression of viewing hours on hype
    Regression,
    /// Peaker classification per title
    Lifecycle,
    /// Hype distribution per title
    Volatility,
    /// Re-render status and leaderboard every DASHBOARD_REFRESH_SECS
    Watch {
        #[arg(long, value_enum, default_value_t = Metric::HypeScore)]
        metric: Metric,
        #[arg(long)]
        top: Option<usize>,
    },
}

/// CLI handler
pub struct CliHandler<L> {
    reader: LogReader<L>,
    config: DashboardConfig,
    json: bool,
}

impl<L: OutputLog> CliHandler<L> {
    pub fn new(log: L, config: DashboardConfig, json: bool) -> Self {
        Self { reader: LogReader::new(log, &config), config, json }
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        if let Commands::Watch { metric, top } = command {
            return self.watch(metric, top).await;
        }

        let output = self.render(&command).await?;
        println!("{}", output);
        Ok(())
    }

    /// Render one view from a (possibly cached) read of the log
    pub async fn render(&self, command: &Commands) -> Result<String> {
        let data = self.reader.read().await;
        if let Some(banner) = state_banner(&data) {
            return Ok(banner);
        }
        let records = data.records();

        match command {
            Commands::Status => {
                let summary = summarize(records);
                if self.json {
                    return to_json(&summary);
                }
                let mut out = header("📈 Franchise Dashboard Status");
                let _ = writeln!(out, "📡 Data points processed: {}", summary.total_points);
                let _ = writeln!(out, "🎬 Franchises tracked:     {}", summary.unique_titles);
                let _ = writeln!(out, "⏱️  Last updated:           {}", format_timestamp(summary.last_update));
                let dominant = summary.dominant_lifecycle.map_or("N/A".to_string(), |l| l.to_string());
                let _ = writeln!(out, "🧠 Dominant type:          {}", dominant);
                Ok(out)
            }
            Commands::Leaderboard { metric, top } | Commands::Watch { metric, top } => {
                let rows = leaderboard(records, *metric, top.unwrap_or(self.config.leaderboard_top_n));
                if self.json {
                    return to_json(&rows);
                }
                let mut out = header(&format!("🏆 Top franchises by mean {}", metric));
                let _ = writeln!(
                    out,
                    "{:<4} {:<32} {:>12} {:>10} {:>14} {:>12} {:>12} {:>8}  {}",
                    "#", "Title", "Score", "Hype", "Hours", "Engagement", "Votes", "Samples", "Lifecycle"
                );
                for (i, row) in rows.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "{:<4} {:<32} {:>12.3} {:>10.3} {:>14.1} {:>12.4} {:>12} {:>8}  {}",
                        i + 1,
                        truncate(&row.title, 32),
                        row.score,
                        row.mean_hype,
                        row.mean_netflix_hours,
                        row.mean_engagement,
                        row.max_brand_equity,
                        row.samples,
                        row.lifecycle
                    );
                }
                Ok(out)
            }
            Commands::Series { titles, metric, bucket_secs } => {
                let width = bucket_secs.unwrap_or(self.config.series_bucket_secs);
                let series: Vec<(&String, _)> =
                    titles.iter().map(|t| (t, time_series(records, t, *metric, width))).collect();
                if self.json {
                    return to_json(&series);
                }
                let mut out = header(&format!("📊 {} per {}s bucket", metric, width));
                for (title, points) in series {
                    let _ = writeln!(out, "{}", title);
                    if points.is_empty() {
                        let _ = writeln!(out, "  (no observations)");
                    }
                    for point in points {
                        let _ = writeln!(
                            out,
                            "  {}  {:>12.3}  (n={})",
                            format_timestamp(Some(point.bucket_start)),
                            point.value,
                            point.samples
                        );
                    }
                }
                Ok(out)
            }
            Commands::Regression => {
                let outcome = hype_vs_hours(records, self.config.regression_min_samples);
                if self.json {
                    return to_json(&outcome);
                }
                let mut out = header("🤖 Hype -> Netflix hours (OLS)");
                match outcome {
                    RegressionOutcome::Fitted(model) => {
                        let _ = writeln!(
                            out,
                            "Linear regression R^2 = {:.3}; coef = {:.4}, intercept = {:.2} (n={})",
                            model.r_squared, model.coefficients[0], model.intercept, model.samples
                        );
                    }
                    RegressionOutcome::InsufficientData { samples, required } => {
                        let _ = writeln!(
                            out,
                            "Insufficient data for regression: {} usable rows, need at least {}",
                            samples, required
                        );
                    }
                }
                Ok(out)
            }
            Commands::Lifecycle => {
                let rows = lifecycles(records);
                if self.json {
                    return to_json(&rows);
                }
                let mut out = header("🧬 Franchise lifecycle");
                for row in rows {
                    let _ = writeln!(
                        out,
                        "{:<32} {:<14} peak {:>8.2} at {}",
                        truncate(&row.title, 32),
                        row.lifecycle.to_string(),
                        row.max_hype,
                        format_timestamp(Some(row.peak_ts))
                    );
                }
                Ok(out)
            }
            Commands::Volatility => {
                let rows = volatility(records);
                if self.json {
                    return to_json(&rows);
                }
                let mut out = header("🌊 Hype volatility");
                let _ = writeln!(
                    out,
                    "{:<32} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
                    "Title", "Min", "Q1", "Median", "Q3", "Max", "Samples"
                );
                for row in rows {
                    let _ = writeln!(
                        out,
                        "{:<32} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8.2} {:>8}",
                        truncate(&row.title, 32),
                        row.min,
                        row.q1,
                        row.median,
                        row.q3,
                        row.max,
                        row.samples
                    );
                }
                Ok(out)
            }
        }
    }

    async fn watch(&self, metric: Metric, top: Option<usize>) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.refresh_interval());
        loop {
            interval.tick().await;
            let status = self.render(&Commands::Status).await?;
            let board = self.render(&Commands::Watch { metric, top }).await?;
            // Clear screen and home the cursor
            print!("\x1B[2J\x1B[H");
            println!("{}", status);
            if !matches!(self.reader.read().await, DashboardData::Empty | DashboardData::Failed(_)) {
                println!("{}", board);
            }
        }
    }
}

/// Explicit text for the waiting and error states
pub fn state_banner(data: &DashboardData) -> Option<String> {
    match data {
        DashboardData::Ready(_) => None,
        DashboardData::Empty => Some("⏳ Waiting for data... the output log is empty.".to_string()),
        DashboardData::Failed(message) => {
            Some(format!("❌ Error reading output log: {}\nNo results.", message))
        }
    }
}

fn header(title: &str) -> String {
    format!("{}\n{}\n", title, "=".repeat(50))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn format_timestamp(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map_or("N/A".to_string(), |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(max_chars - 1).collect();
        short.push('…');
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use franchise_core::CanonicalRecord;
    use franchise_queue::MemoryLog;

    fn config() -> DashboardConfig {
        DashboardConfig { cache_ttl_secs: 0, regression_min_samples: 3, ..DashboardConfig::default() }
    }

    fn record(title: &str, timestamp: i64, hype: f64) -> CanonicalRecord {
        CanonicalRecord {
            timestamp,
            title: title.to_string(),
            hype_score: hype,
            brand_equity: 10,
            imdb_rating: Some(8.0),
            netflix_hours: hype * 3.0,
            engagement_score: hype * 0.8,
        }
    }

    #[tokio::test]
    async fn test_empty_log_renders_waiting_state() {
        let handler = CliHandler::new(MemoryLog::new(), config(), false);

        for command in [Commands::Status, Commands::Regression, Commands::Lifecycle] {
            let output = handler.render(&command).await.unwrap();
            assert!(output.contains("Waiting for data"));
        }
    }

    #[tokio::test]
    async fn test_read_failure_renders_error() {
        let log = MemoryLog::new();
        log.set_unavailable(true);
        let handler = CliHandler::new(log, config(), false);

        let output = handler.render(&Commands::Status).await.unwrap();
        assert!(output.contains("Error reading output log"));
        assert!(output.contains("No results"));
    }

    #[tokio::test]
    async fn test_leaderboard_and_regression_views() {
        let log = MemoryLog::new();
        let records: Vec<CanonicalRecord> =
            (1..=5).flat_map(|i| [record("Alpha", i, i as f64), record("Beta", i, 10.0 * i as f64)]).collect();
        log.append_batch(&records).await.unwrap();
        let handler = CliHandler::new(log, config(), false);

        let board = handler.render(&Commands::Leaderboard { metric: Metric::HypeScore, top: Some(1) }).await.unwrap();
        assert!(board.contains("Beta"));
        assert!(!board.contains("Alpha"));

        let regression = handler.render(&Commands::Regression).await.unwrap();
        assert!(regression.contains("coef = 3.0000"));
    }

    #[tokio::test]
    async fn test_json_status() {
        let log = MemoryLog::new();
        log.append_batch(&[record("Alpha", 1, 1.0), record("Alpha", 2, 2.0)]).await.unwrap();
        let handler = CliHandler::new(log, config(), true);

        let output = handler.render(&Commands::Status).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["total_points"], 2);
        assert_eq!(value["unique_titles"], 1);
        assert_eq!(value["dominant_lifecycle"], "Late");
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["franchise-dashboard", "leaderboard", "--metric", "engagement", "--top", "3"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Leaderboard { metric: Metric::EngagementScore, top: Some(3) }));

        let cli = Cli::try_parse_from(["franchise-dashboard", "--json", "series", "Stranger Things", "Wednesday"])
            .unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Series { ref titles, .. } if titles.len() == 2));

        assert!(Cli::try_parse_from(["franchise-dashboard", "series"]).is_err());
    }
}
