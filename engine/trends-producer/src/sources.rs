//! External metric sources.
//!
//! A `MetricSource` answers "what is the current interest in each of these
//! keywords". Failures, rate limits and empty answers are all ordinary
//! outcomes; the caller decides how to retry or substitute.

use async_trait::async_trait;
use franchise_core::config::ProducerConfig;
use franchise_core::events::{coerce_f64, coerce_i64};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SourceError};

/// One observation of a title's interest over time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub hype: f64,
}

/// Keyword interest provider
#[async_trait]
pub trait MetricSource: Send + Sync {
    fn name(&self) -> &str;

    /// Mean interest per keyword. Keywords the provider knows nothing about are
    /// simply absent from the map.
    async fn fetch_interest(&self, keywords: &[String]) -> Result<HashMap<String, f64>>;

    /// Full interest-over-time series for one title, oldest first
    async fn fetch_history(&self, _title: &str) -> Result<Vec<HistoryPoint>> {
        Ok(Vec::new())
    }

    /// Titles currently trending across all searches
    async fn fetch_trending(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Trend index provider reached over HTTP.
///
/// `GET {endpoint}?keywords=a,b,c&timeframe=...` answering a JSON object keyed
/// by keyword whose values are either an array of index points or one number.
///
/// History requests use the same endpoint with `series=points` and the backfill
/// timeframe; the answer maps the keyword to `{"timestamp", "value"}` objects or
/// `[timestamp, value]` pairs. The optional trending endpoint answers a JSON
/// array of titles (strings or objects with a `title` field).
pub struct HttpTrendSource {
    client: Client,
    endpoint: String,
    timeframe: String,
    history_timeframe: String,
    trending_endpoint: Option<String>,
    trending_limit: usize,
    api_key: Option<String>,
}

impl HttpTrendSource {
    pub fn new(endpoint: impl Into<String>, config: &ProducerConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.source_timeout()).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeframe: config.trends_timeframe.clone(),
            history_timeframe: config.backfill_timeframe.clone(),
            trending_endpoint: config.trending_endpoint.clone(),
            trending_limit: config.trending_limit,
            api_key: config.trends_api_key.clone(),
        })
    }

    async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value> {
        let mut request = self.client.get(url).query(params);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::RateLimited);
        }
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl MetricSource for HttpTrendSource {
    fn name(&self) -> &str {
        "http-trends"
    }

    async fn fetch_interest(&self, keywords: &[String]) -> Result<HashMap<String, f64>> {
        let joined = keywords.join(",");
        let params = [("keywords", joined.as_str()), ("timeframe", self.timeframe.as_str())];

        debug!("Fetching interest for {:?}", keywords);
        let body = self.get_json(&self.endpoint, &params).await?;
        parse_interest(&body, keywords)
    }

    async fn fetch_history(&self, title: &str) -> Result<Vec<HistoryPoint>> {
        let params = [("keywords", title), ("timeframe", self.history_timeframe.as_str()), ("series", "points")];

        debug!("Fetching history for {} ({})", title, self.history_timeframe);
        let body = self.get_json(&self.endpoint, &params).await?;
        parse_history(&body, title)
    }

    async fn fetch_trending(&self) -> Result<Vec<String>> {
        let Some(endpoint) = &self.trending_endpoint else {
            return Ok(Vec::new());
        };

        let body = self.get_json(endpoint, &[]).await?;
        let mut titles = parse_trending(&body)?;
        titles.truncate(self.trending_limit);
        Ok(titles)
    }
}

/// Stand-in used when no trend endpoint is configured: every title reads as
/// no interest, so events still carry metadata
pub struct DisabledSource;

#[async_trait]
impl MetricSource for DisabledSource {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn fetch_interest(&self, _keywords: &[String]) -> Result<HashMap<String, f64>> {
        Ok(HashMap::new())
    }
}

/// Reduce a provider response to one mean per requested keyword
pub fn parse_interest(body: &Value, keywords: &[String]) -> Result<HashMap<String, f64>> {
    let object = body.as_object().ok_or_else(|| SourceError::decode("expected a JSON object keyed by keyword"))?;

    let mut results = HashMap::new();
    for keyword in keywords {
        let mean = match object.get(keyword) {
            Some(Value::Array(points)) => {
                let values: Vec<f64> = points.iter().filter_map(coerce_f64).collect();
                if values.is_empty() {
                    continue;
                }
                values.iter().sum::<f64>() / values.len() as f64
            }
            Some(value) => match coerce_f64(value) {
                Some(v) => v,
                None => continue,
            },
            None => continue,
        };
        results.insert(keyword.clone(), mean);
    }
    Ok(results)
}

/// Reduce a history response to the points for `title`, oldest first.
///
/// Points without a usable timestamp or value are skipped; a title missing from
/// the response has no history.
pub fn parse_history(body: &Value, title: &str) -> Result<Vec<HistoryPoint>> {
    let object = body.as_object().ok_or_else(|| SourceError::decode("expected a JSON object keyed by keyword"))?;

    let points = match object.get(title) {
        Some(Value::Array(points)) => points,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => return Err(SourceError::decode(format!("history for {title:?} is not an array"))),
    };

    let mut history: Vec<HistoryPoint> = points
        .iter()
        .filter_map(|point| {
            let (timestamp, value) = match point {
                Value::Object(fields) => (fields.get("timestamp")?, fields.get("value")?),
                Value::Array(pair) if pair.len() == 2 => (&pair[0], &pair[1]),
                _ => return None,
            };
            Some(HistoryPoint { timestamp: coerce_i64(timestamp)?, hype: coerce_f64(value)? })
        })
        .collect();
    history.sort_by_key(|point| point.timestamp);
    Ok(history)
}

/// Titles from a trending-searches response, blanks dropped
pub fn parse_trending(body: &Value) -> Result<Vec<String>> {
    let entries = body.as_array().ok_or_else(|| SourceError::decode("expected a JSON array of titles"))?;

    Ok(entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(title) => Some(title.as_str()),
            Value::Object(fields) => fields.get("title").and_then(Value::as_str),
            _ => None,
        })
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .collect())
}

/// Static per-title facts merged into every event
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TitleMetadata {
    #[serde(default)]
    pub imdb_rating: Option<f64>,
    #[serde(default)]
    pub brand_equity: Option<i64>,
    #[serde(default)]
    pub netflix_hours: Option<f64>,
}

/// Metadata keyed by normalized (trimmed, lowercase) title
#[derive(Debug, Clone, Default)]
pub struct MetadataCatalog {
    by_title: HashMap<String, TitleMetadata>,
}

impl MetadataCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read metadata file: {path:?}"))?;
        Self::from_json(&content).with_context(|| format!("Failed to parse metadata file: {path:?}"))
    }

    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let raw: HashMap<String, TitleMetadata> = serde_json::from_str(content)?;
        let by_title = raw.into_iter().map(|(title, meta)| (normalize_key(&title), meta)).collect();
        Ok(Self { by_title })
    }

    pub fn get(&self, title: &str) -> Option<&TitleMetadata> {
        self.by_title.get(&normalize_key(title))
    }

    pub fn len(&self) -> usize {
        self.by_title.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_title.is_empty()
    }
}

fn normalize_key(title: &str) -> String {
    title.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_interest_means_and_scalars() {
        let body = json!({
            "Dark": [10, 20, "30", null],
            "Ozark": 42.5,
            "Narcos": [],
            "Unrequested": [100]
        });

        let results = parse_interest(&body, &keywords(&["Dark", "Ozark", "Narcos", "Missing"])).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results["Dark"], 20.0);
        assert_eq!(results["Ozark"], 42.5);
    }

    #[test]
    fn test_parse_interest_rejects_non_object() {
        assert!(matches!(parse_interest(&json!([1, 2]), &keywords(&["Dark"])), Err(SourceError::Decode(_))));
    }

    #[tokio::test]
    async fn test_disabled_source_knows_nothing() {
        let results = DisabledSource.fetch_interest(&keywords(&["Dark"])).await.unwrap();
        assert!(results.is_empty());
        assert!(DisabledSource.fetch_history("Dark").await.unwrap().is_empty());
        assert!(DisabledSource.fetch_trending().await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_history_points() {
        let body = json!({
            "Dark": [
                {"timestamp": 1_609_977_600, "value": "55"},
                [1_609_459_200, 40],
                {"timestamp": 1_610_582_400},
                {"timestamp": "soon", "value": 3},
                [1_611_187_200, 61.5]
            ],
            "Ozark": [[1, 2]]
        });

        let history = parse_history(&body, "Dark").unwrap();
        assert_eq!(
            history,
            vec![
                HistoryPoint { timestamp: 1_609_459_200, hype: 40.0 },
                HistoryPoint { timestamp: 1_609_977_600, hype: 55.0 },
                HistoryPoint { timestamp: 1_611_187_200, hype: 61.5 },
            ]
        );
        assert!(parse_history(&body, "Narcos").unwrap().is_empty());
        assert!(matches!(parse_history(&json!({"Dark": 4}), "Dark"), Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_parse_trending_titles() {
        let body = json!(["Wednesday", {"title": " Squid Game "}, {"rank": 3}, "", 7]);
        assert_eq!(parse_trending(&body).unwrap(), vec!["Wednesday", "Squid Game"]);
        assert!(matches!(parse_trending(&json!({"titles": []})), Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_metadata_lookup_is_case_insensitive() {
        let catalog = MetadataCatalog::from_json(
            r#"{"  Stranger Things ": {"imdb_rating": 8.7, "brand_equity": 1300000}, "Dark": {}}"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        let meta = catalog.get("stranger things").unwrap();
        assert_eq!(meta.imdb_rating, Some(8.7));
        assert_eq!(meta.brand_equity, Some(1_300_000));
        assert_eq!(meta.netflix_hours, None);
        assert!(catalog.get("Ozark").is_none());
    }

    #[test]
    fn test_metadata_file_errors() {
        assert!(MetadataCatalog::load(Path::new("/nonexistent/metadata.json")).is_err());
        assert!(MetadataCatalog::from_json("[]").is_err());
    }
}
