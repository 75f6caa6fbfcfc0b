//! Server configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_port() -> u16 {
    4820
}

fn default_sync_interval_minutes() -> u64 {
    10
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("teamcal")
}

/// Configuration at ~/.config/teamcal/config.toml. Every field has a
/// default, so a missing file means "run with defaults".
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_sync_interval_minutes")]
    pub sync_interval_minutes: u64,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        let mut config: ServerConfig = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            toml::from_str("").expect("defaults always deserialize")
        };

        if let Ok(dir) = std::env::var("TEAMCAL_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("teamcal");

        Ok(config_dir.join("config.toml"))
    }
}
