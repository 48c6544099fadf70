use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Register the `/preview` slash command when the gateway is ready
    #[serde(default = "default_true")]
    pub register_commands: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            register_commands: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PreviewConfig {
    /// Edge length of one grid quadrant, in pixels
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    /// Page size used when listing archived threads during fallback search
    #[serde(default = "default_archived_thread_limit")]
    pub archived_thread_limit: u64,
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    #[serde(default = "default_max_videos")]
    pub max_videos: usize,
    #[serde(default = "default_embed_color")]
    pub embed_color: u32,
    #[serde(default = "default_true")]
    pub show_buttons: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            tile_size: default_tile_size(),
            archived_thread_limit: default_archived_thread_limit(),
            max_images: default_max_images(),
            max_videos: default_max_videos(),
            embed_color: default_embed_color(),
            show_buttons: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Largest accepted grid tile edge, in pixels.
pub const MAX_TILE_SIZE: u32 = 2048;

fn default_tile_size() -> u32 {
    320
}

fn default_archived_thread_limit() -> u64 {
    100
}

fn default_max_images() -> usize {
    4
}

fn default_max_videos() -> usize {
    4
}

fn default_embed_color() -> u32 {
    0x5865F2
}

impl Config {
    /// Load from a TOML file if it exists, otherwise start from defaults.
    /// `DISCORD_TOKEN` in the environment always wins over the file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)?
        } else {
            Config {
                discord: DiscordConfig::default(),
                preview: PreviewConfig::default(),
            }
        };

        if let Ok(token) = std::env::var("DISCORD_TOKEN") {
            if !token.trim().is_empty() {
                config.discord.bot_token = token;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN not set and [discord] bot_token is empty");
        }
        if self.preview.tile_size == 0 || self.preview.tile_size > MAX_TILE_SIZE {
            anyhow::bail!(
                "[preview] tile_size must be between 1 and {}, got {}",
                MAX_TILE_SIZE,
                self.preview.tile_size
            );
        }
        if self.preview.archived_thread_limit == 0 {
            anyhow::bail!("[preview] archived_thread_limit must be greater than zero");
        }
        Ok(())
    }
}
