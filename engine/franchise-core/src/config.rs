//! Pipeline configuration.
//!
//! Built once at process start (`PipelineConfig::load`) and handed to each
//! component. Values come from an optional TOML file, then environment
//! variables, then validation. Nothing reads the environment after startup.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Upstream trend providers accept at most this many keywords per request
pub const MAX_KEYWORDS_PER_REQUEST: usize = 5;

/// Main configuration shared by producer, consumer and dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Key-value store connection
    pub redis: RedisConfig,
    /// Queue and output log names
    pub queue: QueueConfig,
    /// Consumer batching and snapshot policy
    pub consumer: ConsumerConfig,
    /// Producer polling and sources
    pub producer: ProducerConfig,
    /// Retry and circuit breaker for external calls
    pub retry: RetryConfig,
    /// Dashboard read path
    pub dashboard: DashboardConfig,
    /// Log output
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 6379, db: 0 }
    }
}

impl RedisConfig {
    /// Connection URL understood by the redis client
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Ingestion queue list key
    pub queue_name: String,
    /// Output log list key
    pub output_log_name: String,
    /// Keep only the newest N output-log entries; `None` keeps everything
    pub output_log_max_len: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_name: "franchise_queue".to_string(),
            output_log_name: "franchise_data".to_string(),
            output_log_max_len: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Maximum items removed from the queue per dequeue
    pub pop_batch: usize,
    /// Buffered records that trigger a snapshot flush
    pub snapshot_every: usize,
    /// NDJSON snapshot file
    pub snapshot_file: PathBuf,
    /// Sleep while the queue is empty
    pub idle_interval_ms: u64,
    /// Log progress every N processed records
    pub progress_log_every: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            pop_batch: 200,
            snapshot_every: 5000,
            snapshot_file: PathBuf::from("./data/franchise_data_snapshot.ndjson"),
            idle_interval_ms: 1000,
            progress_log_every: 1000,
        }
    }
}

impl ConsumerConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Explicit tracked titles; wins over `shows_list_file`
    pub tracked_titles: Vec<String>,
    /// File with one title per line
    pub shows_list_file: Option<PathBuf>,
    /// Upper bound on tracked titles
    pub num_shows: usize,
    /// Keywords per upstream request
    pub batch_size: usize,
    /// Worker pool width for upstream calls
    pub max_workers: usize,
    /// Sleep between polling cycles
    pub cycle_sleep_secs: u64,
    /// Mandatory pause after every upstream call
    pub inter_call_delay_ms: u64,
    /// Trend index provider; `None` disables hype fetching
    pub trends_endpoint: Option<String>,
    /// Provider timeframe expression
    pub trends_timeframe: String,
    /// Optional provider credential
    pub trends_api_key: Option<String>,
    /// JSON file with per-title ratings and vote counts
    pub metadata_file: Option<PathBuf>,
    /// Per-request timeout
    pub source_timeout_secs: u64,
    /// Run a single cycle and exit
    pub run_once: bool,
    /// Replay each title's full interest history once instead of polling
    pub backfill: bool,
    /// Provider timeframe expression for history requests
    pub backfill_timeframe: String,
    /// Current trending searches; `None` leaves every event untrending
    pub trending_endpoint: Option<String>,
    /// Trending entries considered per cycle
    pub trending_limit: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            tracked_titles: Vec::new(),
            shows_list_file: None,
            num_shows: 200,
            batch_size: MAX_KEYWORDS_PER_REQUEST,
            max_workers: 6,
            cycle_sleep_secs: 60,
            inter_call_delay_ms: 2000,
            trends_endpoint: None,
            trends_timeframe: "today 12-m".to_string(),
            trends_api_key: None,
            metadata_file: None,
            source_timeout_secs: 25,
            run_once: false,
            backfill: false,
            backfill_timeframe: "2021-01-01 2025-12-31".to_string(),
            trending_endpoint: None,
            trending_limit: 20,
        }
    }
}

impl ProducerConfig {
    pub fn cycle_sleep(&self) -> Duration {
        Duration::from_secs(self.cycle_sleep_secs)
    }

    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call, including the first
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay_ms: u64,
    /// Ceiling for any single delay
    pub max_delay_ms: u64,
    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
    /// Relative jitter applied to each delay, in [0, 1)
    pub jitter: f64,
    /// Consecutive failed calls that open the circuit
    pub circuit_failure_threshold: u32,
    /// Time the circuit stays open before a probe is allowed
    pub circuit_recovery_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 5_000,
            max_delay_ms: 300_000,
            backoff_multiplier: 2.0,
            jitter: 0.2,
            circuit_failure_threshold: 5,
            circuit_recovery_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Newest output-log entries read per refresh
    pub max_read: usize,
    /// How long a read result is reused
    pub cache_ttl_secs: u64,
    /// Auto-refresh interval of the watch view
    pub refresh_secs: u64,
    /// Regression needs strictly more samples than this
    pub regression_min_samples: usize,
    /// Time-series bucket width
    pub series_bucket_secs: i64,
    /// Default leaderboard length
    pub leaderboard_top_n: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            max_read: 50_000,
            cache_ttl_secs: 10,
            refresh_secs: 10,
            regression_min_samples: 30,
            series_bucket_secs: 7 * 24 * 3600,
            leaderboard_top_n: 10,
        }
    }
}

impl DashboardConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// compact, pretty or json
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: "compact".to_string() }
    }
}

impl PipelineConfig {
    /// Load `.env`, the optional TOML file named by `PIPELINE_CONFIG_FILE`, then
    /// environment overrides, and validate the result
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match std::env::var("PIPELINE_CONFIG_FILE") {
            Ok(path) => Self::load_from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path:?}"))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {path:?}"))
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        if let Some(host) = env.string("REDIS_HOST") {
            self.redis.host = host;
        }
        env.parse_into("REDIS_PORT", &mut self.redis.port)?;
        env.parse_into("REDIS_DB", &mut self.redis.db)?;

        if let Some(name) = env.string("REDIS_QUEUE") {
            self.queue.queue_name = name;
        }
        if let Some(name) = env.string("REDIS_DATA_LIST") {
            self.queue.output_log_name = name;
        }
        if let Some(max_len) = env.parse::<usize>("OUTPUT_LOG_MAX_LEN")? {
            self.queue.output_log_max_len = Some(max_len);
        }

        env.parse_into("POP_BATCH", &mut self.consumer.pop_batch)?;
        env.parse_into("SNAPSHOT_EVERY", &mut self.consumer.snapshot_every)?;
        if let Some(path) = env.string("SNAPSHOT_FILE") {
            self.consumer.snapshot_file = PathBuf::from(path);
        }
        env.parse_into("CONSUMER_IDLE_MS", &mut self.consumer.idle_interval_ms)?;
        env.parse_into("PROGRESS_LOG_EVERY", &mut self.consumer.progress_log_every)?;

        if let Some(titles) = env.string("TRACKED_TITLES") {
            self.producer.tracked_titles = titles
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(path) = env.string("SHOWS_LIST_FILE") {
            self.producer.shows_list_file = Some(PathBuf::from(path));
        }
        env.parse_into("NUM_SHOWS", &mut self.producer.num_shows)?;
        env.parse_into("PYTRENDS_BATCH_SIZE", &mut self.producer.batch_size)?;
        env.parse_into("MAX_WORKERS", &mut self.producer.max_workers)?;
        env.parse_into("PRODUCER_SLEEP", &mut self.producer.cycle_sleep_secs)?;
        env.parse_into("INTER_CALL_DELAY_MS", &mut self.producer.inter_call_delay_ms)?;
        if let Some(endpoint) = env.string("TRENDS_ENDPOINT") {
            self.producer.trends_endpoint = Some(endpoint);
        }
        if let Some(timeframe) = env.string("TRENDS_TIMEFRAME") {
            self.producer.trends_timeframe = timeframe;
        }
        if let Some(key) = env.string("TRENDS_API_KEY") {
            self.producer.trends_api_key = Some(key);
        }
        if let Some(path) = env.string("METADATA_FILE") {
            self.producer.metadata_file = Some(PathBuf::from(path));
        }
        env.parse_into("SOURCE_TIMEOUT_SECS", &mut self.producer.source_timeout_secs)?;
        env.parse_into("PRODUCER_RUN_ONCE", &mut self.producer.run_once)?;
        env.parse_into("PRODUCER_BACKFILL", &mut self.producer.backfill)?;
        if let Some(timeframe) = env.string("BACKFILL_TIMEFRAME") {
            self.producer.backfill_timeframe = timeframe;
        }
        if let Some(endpoint) = env.string("TRENDS_TRENDING_ENDPOINT") {
            self.producer.trending_endpoint = Some(endpoint);
        }
        env.parse_into("TRENDING_LIMIT", &mut self.producer.trending_limit)?;

        env.parse_into("RETRY_MAX_ATTEMPTS", &mut self.retry.max_attempts)?;
        env.parse_into("RETRY_INITIAL_DELAY_MS", &mut self.retry.initial_delay_ms)?;
        env.parse_into("RETRY_MAX_DELAY_MS", &mut self.retry.max_delay_ms)?;
        env.parse_into("RETRY_BACKOFF_MULTIPLIER", &mut self.retry.backoff_multiplier)?;
        env.parse_into("RETRY_JITTER", &mut self.retry.jitter)?;
        env.parse_into("CIRCUIT_FAILURE_THRESHOLD", &mut self.retry.circuit_failure_threshold)?;
        env.parse_into("CIRCUIT_RECOVERY_SECS", &mut self.retry.circuit_recovery_secs)?;

        env.parse_into("MAX_READ", &mut self.dashboard.max_read)?;
        env.parse_into("DASHBOARD_CACHE_TTL_SECS", &mut self.dashboard.cache_ttl_secs)?;
        env.parse_into("DASHBOARD_REFRESH_SECS", &mut self.dashboard.refresh_secs)?;
        env.parse_into("REGRESSION_MIN_SAMPLES", &mut self.dashboard.regression_min_samples)?;
        env.parse_into("SERIES_BUCKET_SECS", &mut self.dashboard.series_bucket_secs)?;
        env.parse_into("LEADERBOARD_TOP_N", &mut self.dashboard.leaderboard_top_n)?;

        if let Some(format) = env.string("PIPELINE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.queue.queue_name.is_empty() || self.queue.output_log_name.is_empty() {
            return Err(anyhow!("Queue and output log names must not be empty"));
        }
        if self.queue.queue_name == self.queue.output_log_name {
            return Err(anyhow!("Queue and output log must be different keys"));
        }
        if self.queue.output_log_max_len == Some(0) {
            return Err(anyhow!("OUTPUT_LOG_MAX_LEN must be positive when set"));
        }

        if self.consumer.pop_batch == 0 {
            return Err(anyhow!("POP_BATCH must be positive"));
        }
        if self.consumer.snapshot_every == 0 {
            return Err(anyhow!("SNAPSHOT_EVERY must be positive"));
        }

        if self.producer.num_shows == 0 {
            return Err(anyhow!("NUM_SHOWS must be positive"));
        }
        if !(1..=MAX_KEYWORDS_PER_REQUEST).contains(&self.producer.batch_size) {
            return Err(anyhow!(
                "PYTRENDS_BATCH_SIZE must be between 1 and {}: {}",
                MAX_KEYWORDS_PER_REQUEST,
                self.producer.batch_size
            ));
        }
        if self.producer.max_workers == 0 {
            return Err(anyhow!("MAX_WORKERS must be positive"));
        }

        if self.retry.max_attempts == 0 {
            return Err(anyhow!("RETRY_MAX_ATTEMPTS must be at least 1"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(anyhow!("RETRY_BACKOFF_MULTIPLIER must be >= 1.0"));
        }
        if !(0.0..1.0).contains(&self.retry.jitter) {
            return Err(anyhow!("RETRY_JITTER must be in [0, 1): {}", self.retry.jitter));
        }
        if self.retry.circuit_failure_threshold == 0 {
            return Err(anyhow!("CIRCUIT_FAILURE_THRESHOLD must be positive"));
        }

        if self.dashboard.max_read == 0 {
            return Err(anyhow!("MAX_READ must be positive"));
        }
        if self.dashboard.series_bucket_secs <= 0 {
            return Err(anyhow!("SERIES_BUCKET_SECS must be positive"));
        }

        match self.logging.format.as_str() {
            "compact" | "pretty" | "json" => {}
            other => return Err(anyhow!("Invalid log format: {}", other)),
        }

        Ok(())
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.string(key) {
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|e| anyhow!("Invalid value for {}: {:?} ({})", key, raw, e)),
            None => Ok(None),
        }
    }

    fn parse_into<T>(&self, key: &str, target: &mut T) -> Result<()>
    where
        T: FromStr,
        T::Err: Display,
    {
        if let Some(value) = self.parse(key)? {
            *target = value;
        }
        Ok(())
    }
}
