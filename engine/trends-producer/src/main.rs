use anyhow::Context;
use franchise_core::{initialize_logging, PipelineConfig};
use franchise_queue::RedisStore;
use std::sync::Arc;
use tracing::{error, info, warn};
use trends_producer::{
    load_titles, CircuitBreaker, DisabledSource, HttpTrendSource, MetadataCatalog, MetricSource, Producer, RetryPolicy,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::load().context("Failed to load configuration")?;
    initialize_logging(&config.logging)?;

    info!("Starting trends producer");

    let titles = load_titles(&config.producer)?;
    if config.producer.backfill {
        info!("Backfilling history for {} titles", titles.len());
    } else {
        info!("Using {} titles for streaming", titles.len());
    }

    let metadata = match &config.producer.metadata_file {
        Some(path) => {
            let catalog = MetadataCatalog::load(path)?;
            info!("Loaded metadata for {} titles from {:?}", catalog.len(), path);
            catalog
        }
        None => MetadataCatalog::empty(),
    };

    let source: Arc<dyn MetricSource> = match &config.producer.trends_endpoint {
        Some(endpoint) => Arc::new(
            HttpTrendSource::new(endpoint.as_str(), &config.producer).context("Failed to create HTTP client")?,
        ),
        None => {
            warn!("TRENDS_ENDPOINT not set; events will carry hype_score 0 and metadata only");
            Arc::new(DisabledSource)
        }
    };

    let store = RedisStore::connect(&config.redis).await.context("Failed to connect to Redis")?;
    let producer = Producer::new(
        store.queue(&config.queue),
        source,
        Arc::new(metadata),
        RetryPolicy::from(&config.retry),
        Arc::new(CircuitBreaker::from_config(&config.retry)),
        &titles,
        config.producer.clone(),
    );

    if let Err(e) = producer.run().await {
        error!("Producer failed: {}", e);
        return Err(e);
    }

    Ok(())
}
