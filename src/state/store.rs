//! Durable key-value store for state that must survive restarts.
//!
//! The store is a single JSON object on disk whose keys are namespaced
//! (`packsync.installed_version`), so it can share a file with other launcher
//! settings without collisions. Writes go to a temporary file first and are
//! renamed into place, so a crash mid-write never leaves a truncated file.
//!
//! # Location
//!
//! - Linux: `~/.local/share/packsync/state.json`
//! - macOS: `~/Library/Application Support/packsync/state.json`
//! - Windows: `%LOCALAPPDATA%\packsync\state.json`

use crate::constants::{INSTALLED_VERSION_KEY, STATE_FILE_NAME};
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// JSON-file backed key-value store.
#[derive(Debug)]
pub struct DurableStore {
    /// Backing file; `None` keeps everything in memory
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl DurableStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or is not a JSON
    /// object.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read state file {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse state file {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = entries.len(), "Opened durable store");
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Store that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Default platform-specific location of the state file.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?;
        Ok(dir.join("packsync").join(STATE_FILE_NAME))
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read a string value.
    pub async fn get_string(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).and_then(Value::as_str).map(str::to_string)
    }

    /// Set `key` to `value` and persist.
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        self.persist(&entries).await
    }

    /// Remove `key` and persist.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }

    /// Persisted installed modpack version.
    pub async fn installed_version(&self) -> Option<String> {
        self.get_string(INSTALLED_VERSION_KEY).await
    }

    /// Persist (or forget) the installed modpack version.
    pub async fn set_installed_version(&self, version: Option<&str>) -> Result<()> {
        match version {
            Some(version) => self.set(INSTALLED_VERSION_KEY, Value::from(version)).await,
            None => self.remove(INSTALLED_VERSION_KEY).await,
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, Value>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create state directory {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(entries).context("Failed to serialize durable state")?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)
            .await
            .with_context(|| format!("Failed to write temp file {}", temp_path.display()))?;
        fs::rename(&temp_path, path)
            .await
            .with_context(|| format!("Failed to replace state file {}", path.display()))?;

        debug!(path = %path.display(), "Persisted durable state");
        Ok(())
    }
}
