use chrono::Utc;
use discord_purge::config::{Config, DEFAULT_CONFIG_PATH};
use discord_purge::discord::DiscordClient;
use discord_purge::runner;
use std::env;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("PURGE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)?;
    debug!("Loaded configuration from {}: {:?}", config_path, config);

    let started_at = Utc::now();
    let client = DiscordClient::new(&config)?;
    let summary = runner::run(&config, &client, started_at).await?;

    info!("Archive written to {}", summary.archive_path.display());
    summary.log();
    Ok(())
}
