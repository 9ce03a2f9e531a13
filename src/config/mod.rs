//! Updater configuration.
//!
//! The orchestrator is configured from a TOML file. The location defaults to
//! the platform configuration directory and can be overridden with the
//! `PACKSYNC_CONFIG_PATH` environment variable.
//!
//! - Linux: `~/.config/packsync/config.toml`
//! - macOS: `~/Library/Application Support/packsync/config.toml`
//! - Windows: `%APPDATA%\packsync\config.toml`
//!
//! # File Format
//!
//! ```toml
//! manifest_url = "https://packs.example.com/manifest.json"
//! install_dir = "/home/steve/.wowid3/game"
//!
//! # Seconds between background manifest polls (0 disables polling)
//! check_interval = 300
//! check_on_startup = true
//!
//! # Seconds between background integrity passes (0 disables)
//! verify_interval = 0
//!
//! [startup_retry]
//! max_retries = 3
//! base_delay_ms = 1000
//! multiplier = 2.0
//! max_delay_ms = 30000
//! jitter = true
//!
//! [verify_retry]
//! max_retries = 2
//! ```

use crate::constants::{
    CONFIG_PATH_ENV, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_VERIFY_INTERVAL_SECS,
    DEFAULT_VERIFY_MAX_RETRIES,
};
use crate::core::PacksyncError;
use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

/// Everything the orchestrator needs to know about its environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// URL of the modpack manifest
    pub manifest_url: String,

    /// Directory the modpack is installed into
    pub install_dir: PathBuf,

    /// Seconds between periodic manifest polls; 0 disables polling
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Whether `Orchestrator::mount` runs the startup check
    #[serde(default = "default_check_on_startup")]
    pub check_on_startup: bool,

    /// Seconds between periodic silent verification passes; 0 disables them
    #[serde(default = "default_verify_interval")]
    pub verify_interval: u64,

    /// Durable state file; defaults to the platform data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Backoff for the startup manifest check
    #[serde(default)]
    pub startup_retry: RetryPolicy,

    /// Backoff for silent background verification
    #[serde(default = "default_verify_retry")]
    pub verify_retry: RetryPolicy,
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_check_on_startup() -> bool {
    true
}

fn default_verify_interval() -> u64 {
    DEFAULT_VERIFY_INTERVAL_SECS
}

fn default_verify_retry() -> RetryPolicy {
    RetryPolicy::default().with_max_retries(DEFAULT_VERIFY_MAX_RETRIES)
}

impl UpdaterConfig {
    /// Configuration with defaults for everything but the URL and directory.
    pub fn new(manifest_url: impl Into<String>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_url: manifest_url.into(),
            install_dir: install_dir.into(),
            check_interval: default_check_interval(),
            check_on_startup: default_check_on_startup(),
            verify_interval: default_verify_interval(),
            state_file: None,
            startup_retry: RetryPolicy::default(),
            verify_retry: default_verify_retry(),
        }
    }

    /// Load from `PACKSYNC_CONFIG_PATH` or the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if no configuration file exists, it cannot be read or
    /// parsed, or it fails [`validate`](Self::validate).
    pub async fn load() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_from(&path).await
    }

    /// Load and validate the configuration at `path`.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read updater config from {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse updater config from {}", path.display()))?;
        config.validate()?;

        debug!(path = %path.display(), url = %config.manifest_url, "Loaded updater config");
        Ok(config)
    }

    /// Location of the configuration file.
    ///
    /// `PACKSYNC_CONFIG_PATH` wins over the platform default.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine configuration directory"))?;
        Ok(dir.join("packsync").join("config.toml"))
    }

    /// Reject configurations the orchestrator cannot run with.
    pub fn validate(&self) -> Result<(), PacksyncError> {
        if self.manifest_url.trim().is_empty() {
            return Err(PacksyncError::Config {
                message: "manifest_url must not be empty".to_string(),
            });
        }
        if self.install_dir.as_os_str().is_empty() {
            return Err(PacksyncError::Config {
                message: "install_dir must not be empty".to_string(),
            });
        }
        let policies = [("startup_retry", &self.startup_retry), ("verify_retry", &self.verify_retry)];
        for (name, policy) in policies {
            if policy.multiplier.is_nan() || policy.multiplier < 1.0 {
                return Err(PacksyncError::Config {
                    message: format!("{name}.multiplier must be at least 1.0"),
                });
            }
        }
        Ok(())
    }

    /// Periodic poll interval, or `None` when polling is disabled.
    pub fn check_period(&self) -> Option<Duration> {
        (self.check_interval > 0).then(|| Duration::from_secs(self.check_interval))
    }

    /// Periodic verification interval, or `None` when disabled.
    pub fn verify_period(&self) -> Option<Duration> {
        (self.verify_interval > 0).then(|| Duration::from_secs(self.verify_interval))
    }
}
