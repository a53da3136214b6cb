use anyhow::Context;
use franchise_consumer::Consumer;
use franchise_core::{initialize_logging, PipelineConfig};
use franchise_queue::RedisStore;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PipelineConfig::load().context("Failed to load configuration")?;
    initialize_logging(&config.logging)?;

    info!("Starting franchise consumer");
    info!(
        "Queue {} -> output log {} on {}:{}",
        config.queue.queue_name, config.queue.output_log_name, config.redis.host, config.redis.port
    );

    let store = RedisStore::connect(&config.redis).await.context("Failed to connect to Redis")?;
    let mut consumer =
        Consumer::new(store.queue(&config.queue), store.output_log(&config.queue), config.consumer.clone());

    if let Err(e) = consumer.run().await {
        error!("Consumer stopped: {}", e);
        return Err(e);
    }

    Ok(())
}
