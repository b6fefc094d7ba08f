//! Main application configuration
//!
//! This module defines the primary configuration structures for the draft-room
//! service, including environment variable loading, TOML files and validation.

use crate::config::{DraftConfig, QueueConfig, RatingConfig};
use crate::types::{ChannelId, Mode, PlayerId};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub queue: QueueConfig,
    pub draft: DraftConfig,
    pub rating: RatingConfig,
    pub storage: StorageSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check and metrics endpoints
    pub health_port: u16,
    /// Whether to serve the health endpoints at all
    pub enable_health_server: bool,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Identities allowed to run administrative commands
    pub admin_ids: Vec<PlayerId>,
    /// Channel that receives match notices when none is given
    pub default_channel: ChannelId,
}

/// Snapshot persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Path of the JSON state document
    pub state_file: PathBuf,
    /// Start from an empty document when the stored one cannot be read;
    /// `false` refuses to start instead
    pub reset_on_corrupt: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "draft-room".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            enable_health_server: true,
            shutdown_timeout_seconds: 30,
            admin_ids: Vec::new(),
            default_channel: 0,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("draft_room_state.json"),
            reset_on_corrupt: true,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("HEALTH_PORT") {
            self.service.health_port = parse_var("HEALTH_PORT", &port)?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds =
                parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Ok(ids) = env::var("ADMIN_IDS") {
            self.service.admin_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| parse_var("ADMIN_IDS", s))
                .collect::<Result<Vec<_>>>()?;
        }

        // Draft settings
        if let Ok(timeout) = env::var("PICK_TIMEOUT_SECONDS") {
            self.draft.pick_timeout_seconds = parse_var("PICK_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Ok(delay) = env::var("AUTOPLAY_DELAY_MS") {
            self.draft.autoplay_delay_ms = parse_var("AUTOPLAY_DELAY_MS", &delay)?;
        }

        // Storage settings
        if let Ok(path) = env::var("STATE_FILE") {
            self.storage.state_file = PathBuf::from(path);
        }
        if let Ok(reset) = env::var("RESET_ON_CORRUPT") {
            self.storage.reset_on_corrupt = parse_var("RESET_ON_CORRUPT", &reset)?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    pub fn is_admin(&self, id: PlayerId) -> bool {
        self.service.admin_ids.contains(&id)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.enable_health_server && config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.admin_ids.iter().any(|id| *id < 0) {
        return Err(anyhow!("Admin ids cannot be in the simulated namespace"));
    }

    config.queue.validate()?;
    config.draft.validate()?;
    config.rating.validate()?;

    let needed = Mode::ALL
        .iter()
        .map(|mode| config.draft.simulated_actions(config.queue.capacity(*mode)))
        .max()
        .unwrap_or(0);
    if config.draft.autoplay_max_steps < needed {
        return Err(anyhow!(
            "Autoplay step bound {} cannot finish a simulated match ({} actions needed)",
            config.draft.autoplay_max_steps,
            needed
        ));
    }

    if config.storage.state_file.as_os_str().is_empty() {
        return Err(anyhow!("State file path cannot be empty"));
    }

    Ok(())
}
