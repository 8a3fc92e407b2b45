use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub server: ServerConfig,
    pub schedule: ScheduleConfig,
}

/// External speech-to-text service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the transcription service (exposes /asr and /health).
    pub base_url: String,
    /// Language passed to the service with every submission.
    pub language: String,
    /// Delay between status polls for asynchronous jobs, in seconds.
    pub poll_interval_seconds: u64,
    /// Maximum number of status polls before a job is marked timed out.
    pub max_poll_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Largest accepted request body, in megabytes. Audio uploads
    /// arrive whole, so this bounds the recording size.
    pub max_upload_mb: u64,
}

/// Recurring maintenance cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Audio files older than this many days are swept.
    pub cleanup_days: u64,
    /// How often the cleanup sweep runs, in hours.
    pub cleanup_interval_hours: u64,
    /// How often the service health check runs, in minutes.
    pub health_interval_minutes: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://transcription:9000".to_string(),
            language: "de".to_string(),
            poll_interval_seconds: 30,
            max_poll_attempts: 60,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            max_upload_mb: 512,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cleanup_days: 7,
            cleanup_interval_hours: 168,
            health_interval_minutes: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
