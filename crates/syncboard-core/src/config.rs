//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/syncboard/config.toml)
//! 3. Environment variables (SYNCBOARD_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "SYNCBOARD";

/// Timing and retry parameters for the polling loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval between status polls for a single resource (ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Interval between batched status polls in list views (ms);
    /// deliberately less aggressive since one tick covers many resources
    #[serde(default = "default_list_poll_interval_ms")]
    pub list_poll_interval_ms: u64,

    /// How long a success status is shown before reverting to idle (ms)
    #[serde(default = "default_revert_after_ms")]
    pub revert_after_ms: u64,

    /// How long a list view holds an error status before clearing it (ms)
    #[serde(default = "default_error_hold_ms")]
    pub error_hold_ms: u64,

    /// Consecutive poll failures tolerated before giving up
    #[serde(default = "default_failure_limit")]
    pub failure_limit: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            list_poll_interval_ms: default_list_poll_interval_ms(),
            revert_after_ms: default_revert_after_ms(),
            error_hold_ms: default_error_hold_ms(),
            failure_limit: default_failure_limit(),
        }
    }
}

impl PollConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn list_poll_interval(&self) -> Duration {
        Duration::from_millis(self.list_poll_interval_ms)
    }

    pub fn revert_after(&self) -> Duration {
        Duration::from_millis(self.revert_after_ms)
    }

    pub fn error_hold(&self) -> Duration {
        Duration::from_millis(self.error_hold_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_list_poll_interval_ms() -> u64 {
    10_000
}

fn default_revert_after_ms() -> u64 {
    3_000
}

fn default_error_hold_ms() -> u64 {
    5_000
}

fn default_failure_limit() -> u32 {
    3
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Dashboard server base URL (optional)
    #[serde(default)]
    pub server_url: Option<String>,

    /// API key sent with every backend request (optional)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Polling parameters
    #[serde(default)]
    pub poll: PollConfig,
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SYNCBOARD_SERVER_URL, SYNCBOARD_API_KEY)
    /// 2. Config file (~/.config/syncboard/config.toml or SYNCBOARD_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // SYNCBOARD_SERVER_URL
        if let Ok(val) = std::env::var(format!("{}_SERVER_URL", ENV_PREFIX)) {
            self.server_url = if val.is_empty() { None } else { Some(val) };
        }

        // SYNCBOARD_API_KEY
        if let Ok(val) = std::env::var(format!("{}_API_KEY", ENV_PREFIX)) {
            self.api_key = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SYNCBOARD_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("syncboard")
            .join("config.toml")
    }
}
