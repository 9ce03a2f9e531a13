//! Observable orchestration state.
//!
//! There is exactly one [`OrchestrationState`] per orchestrator. It lives in a
//! [`StateStore`] backed by a [`tokio::sync::watch`] channel: the presentation
//! layer reads consistent snapshots or awaits changes, and only orchestrator
//! actions can mutate it. Every action applies all of its field changes inside
//! a single `send_modify` call, so readers never see a half-applied update (a
//! busy flag cleared while its progress bar lingers, for example).
//!
//! # Busy modes
//!
//! | Flag                     | Set by                               | UI treatment           |
//! |--------------------------|--------------------------------------|------------------------|
//! | `is_downloading`         | voluntary install, manual repair     | dismissible progress   |
//! | `is_blocked_for_install` | mandatory install                    | unskippable screen     |
//! | `is_verifying`           | silent background verification       | nothing, or a spinner  |
//!
//! At most one of the three is true at any time; busy work is serialized by the
//! install-directory lock before any flag is raised.
//!
//! # Persistence
//!
//! Only `installed_version` survives restarts, through the [`store`] module.
//! Everything else starts from defaults in each process.

pub mod store;

use crate::bridge::ProgressEvent;
use crate::manifest::Manifest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

pub use store::DurableStore;

/// Byte progress of the active foreground operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Bytes done
    pub current: u64,
    /// Bytes expected
    pub total: u64,
}

/// The three mutually exclusive kinds of busy work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BusyMode {
    /// User-initiated install or repair
    Downloading,
    /// Silent background verification
    Verifying,
    /// Mandatory install the user cannot dismiss
    BlockedForInstall,
}

/// Everything the presentation layer can observe about updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrchestrationState {
    /// Last version confirmed present on disk
    pub installed_version: Option<String>,
    /// Most recently fetched manifest
    pub latest_manifest: Option<Arc<Manifest>>,
    /// Whether the fetched manifest should be installed
    pub update_available: bool,
    /// Voluntary install or manual repair in progress
    pub is_downloading: bool,
    /// Silent verification in progress
    pub is_verifying: bool,
    /// Mandatory install in progress
    pub is_blocked_for_install: bool,
    /// Byte progress, present only while a progress-emitting call runs
    pub download_progress: Option<DownloadProgress>,
    /// Last user-facing failure message
    pub error: Option<String>,
    /// Whether the startup check has settled
    pub has_checked_for_modpack: bool,
    /// Consecutive failed startup check attempts
    pub check_retries: u32,
    /// When the startup check last failed
    pub last_check_attempt: Option<DateTime<Utc>>,
    /// Most recent failure swallowed by a background operation
    pub last_silent_error: Option<String>,
    /// Content digest of the manifest last confirmed to match disk
    pub confirmed_content_digest: Option<String>,
}

impl OrchestrationState {
    /// Fresh state for a process that already knows its installed version.
    pub fn with_installed_version(installed_version: Option<String>) -> Self {
        Self {
            installed_version,
            ..Self::default()
        }
    }

    /// Whether any busy flag is raised.
    pub fn is_busy(&self) -> bool {
        self.is_downloading || self.is_verifying || self.is_blocked_for_install
    }

    /// The active busy mode, if any.
    pub fn busy_mode(&self) -> Option<BusyMode> {
        if self.is_blocked_for_install {
            Some(BusyMode::BlockedForInstall)
        } else if self.is_downloading {
            Some(BusyMode::Downloading)
        } else if self.is_verifying {
            Some(BusyMode::Verifying)
        } else {
            None
        }
    }

    /// Number of busy flags currently raised (never more than one).
    pub fn busy_flag_count(&self) -> usize {
        [self.is_downloading, self.is_verifying, self.is_blocked_for_install]
            .into_iter()
            .filter(|flag| *flag)
            .count()
    }

    /// Version of the most recently fetched manifest.
    pub fn latest_version(&self) -> Option<&str> {
        self.latest_manifest.as_deref().map(|m| m.version.as_str())
    }

    fn set_busy_flag(&mut self, mode: BusyMode, value: bool) {
        match mode {
            BusyMode::Downloading => self.is_downloading = value,
            BusyMode::Verifying => self.is_verifying = value,
            BusyMode::BlockedForInstall => self.is_blocked_for_install = value,
        }
    }
}

/// Owner of the single [`OrchestrationState`].
#[derive(Debug)]
pub struct StateStore {
    sender: watch::Sender<OrchestrationState>,
}

impl StateStore {
    /// Create a store seeded with the persisted installed version.
    pub fn new(installed_version: Option<String>) -> Self {
        let (sender, _) = watch::channel(OrchestrationState::with_installed_version(installed_version));
        Self {
            sender,
        }
    }

    /// Consistent copy of the current state.
    pub fn snapshot(&self) -> OrchestrationState {
        self.sender.borrow().clone()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<OrchestrationState> {
        self.sender.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut OrchestrationState)) {
        self.sender.send_modify(apply);
    }

    pub(crate) fn installed_version(&self) -> Option<String> {
        self.sender.borrow().installed_version.clone()
    }

    pub(crate) fn latest_manifest(&self) -> Option<Arc<Manifest>> {
        self.sender.borrow().latest_manifest.clone()
    }

    pub(crate) fn set_installed_version(&self, version: Option<String>) {
        self.update(|state| state.installed_version = version);
    }

    /// Nothing is installed any more; drop everything tied to the old install.
    pub(crate) fn forget_installed(&self) {
        self.update(|state| {
            state.installed_version = None;
            state.update_available = false;
            state.confirmed_content_digest = None;
        });
    }

    pub(crate) fn clear_error(&self) {
        self.update(|state| state.error = None);
    }

    pub(crate) fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| state.error = Some(message));
    }

    pub(crate) fn record_silent_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| state.last_silent_error = Some(message));
    }

    /// Store a freshly fetched manifest.
    ///
    /// Raises `update_available` when the manifest's version differs from a
    /// known installed version. Returns `true` only when that raised the flag.
    pub(crate) fn publish_manifest(&self, manifest: Arc<Manifest>) -> bool {
        let mut newly_available = false;
        self.update(|state| {
            if let Some(installed) = &state.installed_version {
                if *installed != manifest.version && !state.update_available {
                    state.update_available = true;
                    newly_available = true;
                }
            }
            state.latest_manifest = Some(manifest);
        });
        newly_available
    }

    pub(crate) fn mark_update_available(&self) {
        self.update(|state| state.update_available = true);
    }

    pub(crate) fn confirm_content(&self, digest: String) {
        self.update(|state| state.confirmed_content_digest = Some(digest));
    }

    /// Raise the flag for `mode` and return a guard that lowers it on drop.
    ///
    /// Foreground modes also clear `error`; `progress_total` seeds the progress
    /// bar for operations that emit progress.
    pub(crate) fn enter_busy(
        self: &Arc<Self>,
        mode: BusyMode,
        progress_total: Option<u64>,
    ) -> BusyGuard {
        self.update(|state| {
            state.set_busy_flag(mode, true);
            if mode != BusyMode::Verifying {
                state.error = None;
            }
            state.download_progress = progress_total.map(|total| DownloadProgress {
                current: 0,
                total,
            });
        });
        debug!(?mode, "Entered busy mode");
        BusyGuard {
            state: Arc::clone(self),
            mode,
        }
    }

    fn leave_busy(&self, mode: BusyMode) {
        self.update(|state| {
            state.set_busy_flag(mode, false);
            state.download_progress = None;
        });
        debug!(?mode, "Left busy mode");
    }

    /// Overwrite the progress bar with the event's cumulative byte counts.
    pub(crate) fn apply_progress(&self, event: &ProgressEvent) {
        self.sender.send_if_modified(|state| {
            if !state.is_busy() {
                return false;
            }
            state.download_progress = Some(DownloadProgress {
                current: event.current_bytes,
                total: event.total_bytes,
            });
            true
        });
    }

    /// Reset the progress bar to zero of `total` bytes for the running operation.
    pub(crate) fn seed_progress(&self, total: u64) {
        self.sender.send_if_modified(|state| {
            if !state.is_busy() {
                return false;
            }
            state.download_progress = Some(DownloadProgress {
                current: 0,
                total,
            });
            true
        });
    }

    /// Record a successful install of `manifest`.
    pub(crate) fn complete_install(&self, manifest: &Manifest) {
        let digest = manifest.content_digest();
        self.update(|state| {
            state.installed_version = Some(manifest.version.clone());
            state.update_available = false;
            state.check_retries = 0;
            state.last_check_attempt = None;
            state.last_silent_error = None;
            state.confirmed_content_digest = Some(digest);
        });
    }

    pub(crate) fn record_check_failure(&self, retries: u32, at: Option<DateTime<Utc>>, message: String) {
        self.update(|state| {
            state.check_retries = retries;
            state.last_check_attempt = at;
            state.last_silent_error = Some(message);
        });
    }

    /// Mark the startup check as settled.
    pub(crate) fn finish_startup_check(&self, error: Option<String>) {
        self.update(|state| {
            state.has_checked_for_modpack = true;
            match error {
                Some(message) => state.error = Some(message),
                None => {
                    state.check_retries = 0;
                    state.last_check_attempt = None;
                }
            }
        });
    }

    /// Clear every transient field; `installed_version` survives.
    pub(crate) fn reset(&self) {
        self.update(|state| {
            let installed_version = state.installed_version.take();
            *state = OrchestrationState::with_installed_version(installed_version);
        });
    }
}

/// Lowers a busy flag and clears progress when dropped.
#[derive(Debug)]
pub(crate) struct BusyGuard {
    state: Arc<StateStore>,
    mode: BusyMode,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.state.leave_busy(self.mode);
    }
}
