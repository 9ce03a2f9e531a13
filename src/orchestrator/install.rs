//! Installing the latest manifest.
//!
//! An install runs under the install-directory lock with exactly one busy flag
//! raised: `is_blocked_for_install` when the install is mandatory, otherwise
//! `is_downloading`. Progress from the backend is mirrored into
//! `download_progress` for the duration of the call only.
//!
//! The flag, the progress bar, the progress subscription, and the directory
//! lock are all released by guards, so a failed, successful, or cancelled
//! install leaves the state idle. A failed install never changes
//! `installed_version`.

use super::Orchestrator;
use super::verify::VerifyOptions;
use crate::bridge::{CommandBridge, ProgressSubscription};
use crate::core::{PacksyncError, Result};
use crate::manifest::Manifest;
use crate::state::BusyMode;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How an install presents itself to the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Mandatory install the user cannot dismiss
    pub blocking: bool,
}

impl InstallOptions {
    /// A mandatory install (first install, incompatible update).
    pub fn blocking() -> Self {
        Self {
            blocking: true,
        }
    }

    /// An install the user chose to start.
    pub fn voluntary() -> Self {
        Self {
            blocking: false,
        }
    }

    fn busy_mode(self) -> BusyMode {
        if self.blocking {
            BusyMode::BlockedForInstall
        } else {
            BusyMode::Downloading
        }
    }
}

impl<B: CommandBridge> Orchestrator<B> {
    /// Install `latest_manifest` into the configured directory.
    ///
    /// On success the manifest's version becomes `installed_version`, is
    /// persisted, and a silent verification is started in the background. The
    /// returned string is the backend's completion message.
    ///
    /// # Errors
    ///
    /// - [`PacksyncError::NoManifest`] if no manifest has been fetched
    /// - [`PacksyncError::EmptyManifest`] if the manifest lists no files
    /// - [`PacksyncError::Install`] if the backend rejects the install
    ///
    /// Every error is also written to `error`.
    pub async fn install(&self, options: InstallOptions) -> Result<String> {
        let manifest = match self.installable_manifest() {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(error = %err, "Cannot install modpack");
                self.state.set_error(err.to_string());
                return Err(err);
            }
        };

        let dir = &self.config.install_dir;
        // Declaration order matters: the busy flag drops before the lock.
        let _dir_guard = self.locks.acquire(dir, "install").await;
        let _busy = self.state.enter_busy(options.busy_mode(), Some(manifest.total_size()));

        info!(
            version = %manifest.version,
            files = manifest.files.len(),
            bytes = manifest.total_size(),
            blocking = options.blocking,
            "Installing modpack"
        );

        let mut progress = ProgressSubscription::new(self.bridge.subscribe_progress(), "install");
        let state = &self.state;
        let result = progress
            .drive(self.bridge.install(&manifest, dir), |event| state.apply_progress(event))
            .await;
        drop(progress);

        match result {
            Ok(message) => {
                self.state.complete_install(&manifest);
                if let Err(err) = self.store.set_installed_version(Some(&manifest.version)).await {
                    warn!(
                        version = %manifest.version,
                        error = %format!("{err:#}"),
                        "Failed to persist installed version"
                    );
                }
                info!(version = %manifest.version, "Modpack installed");

                self.spawn_silent_verify();
                Ok(message)
            }
            Err(err) => {
                let err = PacksyncError::install(&manifest.version, err);
                warn!(version = %manifest.version, error = %err, "Modpack install failed");
                self.state.set_error(err.to_string());
                Err(err)
            }
        }
    }

    fn installable_manifest(&self) -> Result<Arc<Manifest>> {
        let manifest = self.state.latest_manifest().ok_or(PacksyncError::NoManifest)?;
        if !manifest.is_installable() {
            return Err(PacksyncError::EmptyManifest {
                version: manifest.version.clone(),
            });
        }
        Ok(manifest)
    }

    /// Fire-and-forget integrity pass after a successful install.
    ///
    /// The task queues on the directory lock, so it starts only once the
    /// install has released it.
    fn spawn_silent_verify(&self) {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            debug!("Starting post-install verification");
            let _ = orchestrator.verify_and_repair(VerifyOptions::silent()).await;
        });
    }
}
