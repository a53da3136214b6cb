//! # Franchise Dashboard Binary
//!
//! Text dashboard over the output log.

use anyhow::{Context, Result};
use clap::Parser;
use franchise_analytics::cli::{state_banner, Cli, CliHandler};
use franchise_analytics::DashboardData;
use franchise_core::{initialize_logging, PipelineConfig};
use franchise_queue::RedisStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    let mut config = PipelineConfig::load().context("Failed to load configuration")?;
    initialize_logging(&config.logging)?;
    if let Some(max_read) = cli.max_read {
        config.dashboard.max_read = max_read;
    }

    // An unreachable store is a dashboard state, not a crash
    let store = match RedisStore::connect(&config.redis).await {
        Ok(store) => store,
        Err(e) => {
            let failed = DashboardData::Failed(format!("cannot connect to Redis: {}", e));
            if let Some(banner) = state_banner(&failed) {
                println!("{}", banner);
            }
            return Ok(());
        }
    };
    let handler = CliHandler::new(store.output_log(&config.queue), config.dashboard.clone(), cli.json);

    handler.handle_command(cli.command).await?;

    Ok(())
}
