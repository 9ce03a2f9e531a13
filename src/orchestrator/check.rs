//! Update checks: manual, at startup, and periodic.
//!
//! All three paths fetch through the same deduplicator key (the manifest URL),
//! so a manual check that lands while the periodic poll is fetching simply
//! joins it. They differ in how failures are reported:
//!
//! - [`check_updates`](Orchestrator::check_updates) is user-initiated and
//!   surfaces failures in `error`.
//! - [`startup_check`](Orchestrator::startup_check) retries with backoff and
//!   surfaces only the final failure.
//! - [`poll_once`](Orchestrator::poll_once) logs and swallows everything.
//!
//! A version string change always means an update. When the version is
//! unchanged the periodic poll additionally asks the backend whether the files
//! on disk still match the manifest, which catches packs republished under the
//! same version. Content the backend already confirmed is remembered by its
//! digest so the check is not repeated every cycle.

use super::Orchestrator;
use super::verify::VerifyOptions;
use crate::bridge::CommandBridge;
use crate::core::{PacksyncError, Result};
use crate::manifest::{Manifest, compare_versions};
use crate::retry::RetryState;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, info, warn};

impl<B: CommandBridge> Orchestrator<B> {
    /// Check the manifest URL for a new modpack version.
    ///
    /// Clears `error` first. On success the manifest becomes `latest_manifest`
    /// and `update_available` is raised when it names a version other than the
    /// installed one. On failure `error` holds the backend's message.
    pub async fn check_updates(&self) -> Result<Arc<Manifest>> {
        self.state.clear_error();
        self.fetch_manifest(true).await
    }

    /// Reconcile the installed version with disk, then check with retries.
    ///
    /// Each failed attempt is counted in `check_retries` and waits the startup
    /// retry policy's backoff. Once the policy is exhausted the last failure is
    /// surfaced in `error` and returned. `has_checked_for_modpack` is set when
    /// this returns, whatever the outcome.
    pub async fn startup_check(&self) -> Result<Arc<Manifest>> {
        self.state.clear_error();
        self.reconcile_installed_version().await;

        let mut retry = RetryState::new(self.config.startup_retry);
        let result = loop {
            match self.fetch_manifest(false).await {
                Ok(manifest) => {
                    retry.reset_retry_count();
                    break Ok(manifest);
                }
                Err(err) => {
                    let delay = retry.record_failure();
                    self.state.record_check_failure(
                        retry.retry_count(),
                        retry.last_error_at(),
                        err.to_string(),
                    );

                    if !retry.can_retry() {
                        warn!(
                            attempts = retry.retry_count(),
                            error = %err,
                            "Startup manifest check failed, giving up"
                        );
                        break Err(err);
                    }

                    warn!(
                        attempt = retry.retry_count(),
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Startup manifest check failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        };

        self.state.finish_startup_check(result.as_ref().err().map(ToString::to_string));
        result
    }

    /// One periodic poll cycle. Never fails and never touches `error`.
    pub async fn poll_once(&self) {
        let manifest = match self.fetch_manifest(false).await {
            Ok(manifest) => manifest,
            Err(err) => {
                warn!(error = %err, "Periodic manifest check failed");
                self.state.record_silent_error(err.to_string());
                return;
            }
        };

        let snapshot = self.state.snapshot();
        let Some(installed) = snapshot.installed_version.as_deref() else {
            return;
        };
        // A differing version was already flagged when the manifest was published.
        if installed != manifest.version || snapshot.update_available {
            return;
        }

        let digest = manifest.content_digest();
        if snapshot.confirmed_content_digest.as_deref() == Some(digest.as_str()) {
            debug!(version = %manifest.version, "Manifest content already confirmed");
            return;
        }

        match self.bridge.manifest_changed(&manifest, &self.config.install_dir).await {
            Ok(true) => {
                info!(
                    version = %manifest.version,
                    "Modpack content changed without a version bump"
                );
                self.state.mark_update_available();
            }
            Ok(false) => {
                debug!(version = %manifest.version, digest = %digest, "Confirmed manifest content");
                self.state.confirm_content(digest);
            }
            Err(err) => {
                warn!(error = %err, "Content change check failed");
                self.state.record_silent_error(err.message);
            }
        }
    }

    /// Run the mount-time check if configured, then start the background loops.
    ///
    /// With `check_on_startup` set this awaits [`startup_check`](Self::startup_check);
    /// its final failure is already in `error`, so it does not stop the loops
    /// from starting.
    pub async fn mount(&self) -> BackgroundTasks {
        if self.config.check_on_startup {
            let _ = self.startup_check().await;
        } else {
            debug!("Startup check disabled");
        }
        self.spawn_background_tasks()
    }

    /// Start the periodic poll and, when configured, periodic verification.
    ///
    /// The first tick of each loop fires one full interval after this call.
    /// Loops with a zero interval are not started.
    pub fn spawn_background_tasks(&self) -> BackgroundTasks {
        let mut handles = Vec::new();

        if let Some(period) = self.config.check_period() {
            let orchestrator = self.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = periodic(period);
                loop {
                    ticker.tick().await;
                    orchestrator.poll_once().await;
                }
            }));
            debug!(interval_secs = period.as_secs(), "Started periodic update checks");
        }

        if let Some(period) = self.config.verify_period() {
            let orchestrator = self.clone();
            handles.push(tokio::spawn(async move {
                let mut ticker = periodic(period);
                loop {
                    ticker.tick().await;
                    // Silent passes never return an error.
                    let _ = orchestrator.verify_and_repair(VerifyOptions::silent()).await;
                }
            }));
            debug!(interval_secs = period.as_secs(), "Started periodic verification");
        }

        BackgroundTasks {
            handles,
        }
    }

    /// Fetch the manifest through the deduplicator and publish it.
    ///
    /// Callers joining an in-flight fetch receive the same `Arc`. Failures are
    /// written to `error` only when `surface_errors` is set.
    pub(crate) async fn fetch_manifest(&self, surface_errors: bool) -> Result<Arc<Manifest>> {
        let url = self.config.manifest_url.as_str();
        let bridge = &self.bridge;

        let result = self
            .manifests
            .execute(url, || async move {
                debug!(url, "Fetching modpack manifest");
                bridge
                    .fetch_manifest(url)
                    .await
                    .map(Arc::new)
                    .map_err(|err| PacksyncError::fetch(url, err))
            })
            .await;

        match result {
            Ok(manifest) => {
                if self.state.publish_manifest(Arc::clone(&manifest)) {
                    let installed = self.state.installed_version().unwrap_or_default();
                    info!(
                        installed = %installed,
                        latest = %manifest.version,
                        change = ?compare_versions(&installed, &manifest.version),
                        "Modpack update available"
                    );
                }
                Ok(manifest)
            }
            Err(err) => {
                if surface_errors {
                    self.state.set_error(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Ask the backend what is on disk; disk wins over the store.
    ///
    /// A version on disk replaces the stored one, and an empty directory clears
    /// it. Only a failed read keeps the stored value.
    async fn reconcile_installed_version(&self) {
        let dir = &self.config.install_dir;
        match self.bridge.get_installed_version(dir).await {
            Ok(Some(on_disk)) => {
                if self.state.installed_version().as_deref() == Some(on_disk.as_str()) {
                    return;
                }
                info!(version = %on_disk, dir = %dir.display(), "Installed version read from disk");
                if let Err(err) = self.store.set_installed_version(Some(&on_disk)).await {
                    warn!(error = %format!("{err:#}"), "Failed to persist installed version");
                }
                self.state.set_installed_version(Some(on_disk));
            }
            Ok(None) => {
                if self.state.installed_version().is_none() {
                    debug!(dir = %dir.display(), "No installed version on disk");
                    return;
                }
                info!(dir = %dir.display(), "Installed modpack missing from disk");
                if let Err(err) = self.store.set_installed_version(None).await {
                    warn!(error = %format!("{err:#}"), "Failed to persist installed version");
                }
                self.state.forget_installed();
            }
            Err(err) => {
                warn!(error = %err, "Failed to read installed version");
                self.state.record_silent_error(err.message);
            }
        }
    }
}

fn periodic(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Handle to the background loops; dropping it stops them.
#[derive(Debug)]
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Number of loops running.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no loop was started.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every loop and wait until they have finished.
    pub async fn shutdown(mut self) {
        let handles = std::mem::take(&mut self.handles);
        for handle in &handles {
            handle.abort();
        }
        join_all(handles).await;
        debug!("Background tasks stopped");
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}
