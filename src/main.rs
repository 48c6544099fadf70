mod config;
mod delivery;
mod error;
mod grid;
mod links;
mod platform;
mod preview;
mod resolver;
mod trigger;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Loaded first so RUST_LOG from .env reaches the filter; a missing .env is fine
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,msglink_preview=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Tile size: {}px", config.preview.tile_size);
    info!(
        "  Archived thread page size: {}",
        config.preview.archived_thread_limit
    );
    info!("  Register commands: {}", config.discord.register_commands);

    info!("Bot is starting...");
    platform::discord::run(config).await?;

    Ok(())
}
