//! Integrity verification and repair.
//!
//! Two flavours share one backend primitive:
//!
//! - **Silent** passes run after every install and, optionally, on a timer.
//!   They raise `is_verifying`, never report progress, never write `error`,
//!   and retry failures with the verify retry policy before giving up.
//! - **Manual** repairs are user-initiated. They behave like a voluntary
//!   install: `is_downloading` with a progress bar, and failures land in
//!   `error`.
//!
//! Both re-fetch the manifest first, so a repair always targets the content
//! the server currently publishes.

use super::Orchestrator;
use crate::bridge::{CommandBridge, ProgressSubscription};
use crate::core::{PacksyncError, Result};
use crate::manifest::Manifest;
use crate::retry::RetryState;
use crate::state::BusyMode;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// How a verification pass reports itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Background pass: no progress, no user-facing errors
    pub silent: bool,
}

impl VerifyOptions {
    /// A background pass.
    pub fn silent() -> Self {
        Self {
            silent: true,
        }
    }

    /// A user-initiated repair.
    pub fn manual() -> Self {
        Self {
            silent: false,
        }
    }
}

impl<B: CommandBridge> Orchestrator<B> {
    /// Verify the installed files and repair anything missing or corrupt.
    ///
    /// Returns the backend's completion message, or `None` when a silent pass
    /// was skipped or gave up.
    ///
    /// # Errors
    ///
    /// Silent passes always return `Ok`. Manual repairs return
    /// [`PacksyncError::Fetch`] or [`PacksyncError::Verify`] and write the
    /// message to `error`.
    pub async fn verify_and_repair(&self, options: VerifyOptions) -> Result<Option<String>> {
        if options.silent {
            Ok(self.silent_verify().await)
        } else {
            self.manual_repair().await.map(Some)
        }
    }

    async fn silent_verify(&self) -> Option<String> {
        if self.state.installed_version().is_none() {
            debug!("Nothing installed, skipping silent verification");
            return None;
        }

        let mut retry = RetryState::new(self.config.verify_retry);
        loop {
            match self.silent_attempt().await {
                Ok(message) => {
                    debug!(message = %message, "Silent verification finished");
                    return Some(message);
                }
                Err(err) => {
                    let delay = retry.record_failure();
                    self.state.record_silent_error(err.to_string());

                    if !retry.can_retry() {
                        warn!(
                            attempts = retry.retry_count(),
                            error = %err,
                            "Silent verification failed, giving up"
                        );
                        return None;
                    }

                    warn!(
                        attempt = retry.retry_count(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Silent verification failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn silent_attempt(&self) -> Result<String> {
        let dir = &self.config.install_dir;
        let _dir_guard = self.locks.acquire(dir, "verify").await;
        let _busy = self.state.enter_busy(BusyMode::Verifying, None);

        let manifest = self.fetch_manifest(false).await?;
        let message = self
            .bridge
            .verify_and_repair(&manifest, dir)
            .await
            .map_err(PacksyncError::verify)?;

        self.confirm_verified(&manifest);
        Ok(message)
    }

    async fn manual_repair(&self) -> Result<String> {
        let dir = &self.config.install_dir;
        let _dir_guard = self.locks.acquire(dir, "repair").await;
        let _busy = self.state.enter_busy(BusyMode::Downloading, None);

        let manifest = self.fetch_manifest(true).await?;
        self.state.seed_progress(manifest.total_size());
        info!(version = %manifest.version, files = manifest.files.len(), "Repairing modpack");

        let mut progress = ProgressSubscription::new(self.bridge.subscribe_progress(), "repair");
        let state = &self.state;
        let result = progress
            .drive(self.bridge.verify_and_repair(&manifest, dir), |event| {
                state.apply_progress(event)
            })
            .await;
        drop(progress);

        match result {
            Ok(message) => {
                info!(version = %manifest.version, "Modpack repaired");
                self.confirm_verified(&manifest);
                Ok(message)
            }
            Err(err) => {
                let err = PacksyncError::verify(err);
                warn!(version = %manifest.version, error = %err, "Modpack repair failed");
                self.state.set_error(err.to_string());
                Err(err)
            }
        }
    }

    /// Remember the manifest's content as matching disk, if it is the installed one.
    fn confirm_verified(&self, manifest: &Manifest) {
        if self.state.installed_version().as_deref() == Some(manifest.version.as_str()) {
            self.state.confirm_content(manifest.content_digest());
        }
    }
}
