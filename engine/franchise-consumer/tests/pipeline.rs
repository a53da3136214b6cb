//! End-to-end pipeline over the in-memory store: producer-shaped events go
//! through the queue, the consumer and the output log into the dashboard.

use franchise_analytics::{hype_vs_hours, leaderboard, DashboardData, LogReader, Metric, RegressionOutcome};
use franchise_consumer::{Consumer, ConsumerState};
use franchise_core::config::ConsumerConfig;
use franchise_core::{Metrics, RawEvent};
use franchise_queue::{IngestionQueue, MemoryLog, MemoryQueue, OutputLog};
use std::time::Duration;
use tempfile::TempDir;

fn consumer_config(temp_dir: &TempDir) -> ConsumerConfig {
    ConsumerConfig {
        pop_batch: 4,
        snapshot_every: 5,
        snapshot_file: temp_dir.path().join("data/snapshot.ndjson"),
        idle_interval_ms: 10,
        progress_log_every: 10,
    }
}

fn observation(timestamp: i64, title: &str, hype: f64, rating: Option<f64>, hours: f64) -> RawEvent {
    let metrics = Metrics {
        hype_score: Some(hype),
        brand_equity: Some(1_000),
        imdb_rating: rating,
        netflix_hours: Some(hours),
        ..Metrics::default()
    }
    .with_extra("is_trending", hype > 50.0);
    RawEvent::new(timestamp, title, metrics)
}

async fn drain<Q: IngestionQueue, L: OutputLog>(consumer: &mut Consumer<Q, L>) {
    while consumer.poll_once().await.unwrap() == ConsumerState::Draining {}
}

#[tokio::test]
async fn test_events_flow_from_queue_to_dashboard() {
    let temp_dir = TempDir::new().unwrap();
    let queue = MemoryQueue::new();
    let log = MemoryLog::new();
    let mut consumer = Consumer::new(queue.clone(), log.clone(), consumer_config(&temp_dir));

    let mut events = Vec::new();
    for i in 0..4 {
        let ts = 1_700_000_000 + i * 3600;
        events.push(observation(ts, "A", 10.0, Some(7.0), 100.0));
        events.push(observation(ts, "B", 30.0, None, 300.0));
        events.push(observation(ts, "C", 20.0, Some(9.0), 200.0));
    }
    queue.enqueue_batch(&events).await.unwrap();
    queue.enqueue_raw(&["garbage".to_string()]).await.unwrap();

    drain(&mut consumer).await;
    consumer.flush_snapshot();

    assert_eq!(consumer.stats().processed, 12);
    assert_eq!(consumer.stats().skipped, 1);
    assert_eq!(queue.len().await.unwrap(), 0);

    // Output log holds records in dequeue order
    let records = log.records();
    assert_eq!(records.len(), 12);
    assert_eq!(records[0].title, "A");
    assert_eq!(records[1].engagement_score, 15.0);
    assert_eq!(records[2].engagement_score, 18.0);

    // Snapshot mirrors every record
    let snapshot = std::fs::read_to_string(temp_dir.path().join("data/snapshot.ndjson")).unwrap();
    assert_eq!(snapshot.lines().count(), 12);

    let reader = LogReader::with_limits(log.clone(), 1_000, Duration::ZERO);
    let data = reader.read().await;
    assert!(matches!(data, DashboardData::Ready(_)));

    let titles: Vec<String> =
        leaderboard(data.records(), Metric::HypeScore, 2).into_iter().map(|row| row.title).collect();
    assert_eq!(titles, vec!["B", "C"]);

    // Twelve usable rows never clear the default gate of thirty
    assert!(matches!(hype_vs_hours(data.records(), 30), RegressionOutcome::InsufficientData { .. }));
}

#[tokio::test]
async fn test_malformed_items_never_reach_the_log() {
    let temp_dir = TempDir::new().unwrap();
    let queue = MemoryQueue::new();
    let log = MemoryLog::new();
    let mut consumer = Consumer::new(queue.clone(), log.clone(), consumer_config(&temp_dir));

    queue
        .enqueue_raw(&[
            "not json".to_string(),
            r#"{"timestamp": 1, "title": "", "metrics": {}}"#.to_string(),
            r#"[1, 2, 3]"#.to_string(),
        ])
        .await
        .unwrap();

    drain(&mut consumer).await;

    assert_eq!(consumer.stats().skipped, 3);
    assert_eq!(consumer.stats().processed, 0);
    assert!(log.entries().is_empty());

    let reader = LogReader::with_limits(log, 1_000, Duration::ZERO);
    assert!(matches!(reader.read().await, DashboardData::Empty));
}

#[tokio::test]
async fn test_two_producers_share_one_queue() {
    let temp_dir = TempDir::new().unwrap();
    let queue = MemoryQueue::new();
    let log = MemoryLog::new();
    let mut consumer = Consumer::new(queue.clone(), log.clone(), consumer_config(&temp_dir));

    let first = queue.clone();
    let second = queue.clone();
    let a = tokio::spawn(async move {
        for i in 0..10 {
            first.enqueue(&observation(i, "first", i as f64, None, 1.0)).await.unwrap();
        }
    });
    let b = tokio::spawn(async move {
        for i in 0..10 {
            second.enqueue(&observation(i, "second", i as f64, None, 1.0)).await.unwrap();
        }
    });
    a.await.unwrap();
    b.await.unwrap();

    drain(&mut consumer).await;

    // Per-producer order survives interleaving
    let records = log.records();
    for producer in ["first", "second"] {
        let timestamps: Vec<i64> = records.iter().filter(|r| r.title == producer).map(|r| r.timestamp).collect();
        assert_eq!(timestamps, (0..10).collect::<Vec<i64>>());
    }
}
