//! The update and installation orchestrator.
//!
//! [`Orchestrator`] ties the pieces together: it fetches manifests through the
//! [`RequestDeduplicator`], drives installs and repairs through the
//! [`CommandBridge`], serializes busy work on [`DirectoryLocks`], and publishes
//! everything it learns to the [`StateStore`].
//!
//! # Operations
//!
//! | Operation                                   | Errors surfaced in `error` | Module     |
//! |---------------------------------------------|----------------------------|------------|
//! | [`check_updates`](Orchestrator::check_updates)         | yes              | [`check`]  |
//! | [`startup_check`](Orchestrator::startup_check)         | after retries    | [`check`]  |
//! | [`poll_once`](Orchestrator::poll_once)                 | never            | [`check`]  |
//! | [`install`](Orchestrator::install)                     | yes              | [`install`]|
//! | [`verify_and_repair`](Orchestrator::verify_and_repair) | unless silent    | [`verify`] |
//! | [`server_status`](Orchestrator::server_status)         | never            | [`server`] |
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn run<B: packsync::bridge::CommandBridge>(backend: B) -> anyhow::Result<()> {
//! use packsync::config::UpdaterConfig;
//! use packsync::orchestrator::{InstallOptions, Orchestrator};
//!
//! let config = UpdaterConfig::load().await?;
//! let orchestrator = Orchestrator::new(backend, config).await?;
//!
//! orchestrator.startup_check().await.ok();
//! let _tasks = orchestrator.spawn_background_tasks();
//!
//! if orchestrator.snapshot().update_available {
//!     orchestrator.install(InstallOptions::voluntary()).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod check;
pub mod install;
pub mod locks;
pub mod server;
pub mod verify;


use crate::bridge::{CommandBridge, ServerStatus};
use crate::config::UpdaterConfig;
use crate::core::PacksyncError;
use crate::dedup::RequestDeduplicator;
use crate::manifest::Manifest;
use crate::state::{DurableStore, OrchestrationState, StateStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

pub use check::BackgroundTasks;
pub use install::InstallOptions;
pub use locks::{DirectoryGuard, DirectoryLocks};
pub use verify::VerifyOptions;

/// Coordinates update checks, installs, and repairs for one install directory.
///
/// Cloning is cheap and every clone drives the same state, so background tasks
/// simply hold their own clone.
pub struct Orchestrator<B> {
    bridge: Arc<B>,
    config: Arc<UpdaterConfig>,
    state: Arc<StateStore>,
    store: Arc<DurableStore>,
    manifests: Arc<RequestDeduplicator<Arc<Manifest>, PacksyncError>>,
    servers: Arc<RequestDeduplicator<ServerStatus, PacksyncError>>,
    locks: Arc<DirectoryLocks>,
}

impl<B> Clone for Orchestrator<B> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
            config: Arc::clone(&self.config),
            state: Arc::clone(&self.state),
            store: Arc::clone(&self.store),
            manifests: Arc::clone(&self.manifests),
            servers: Arc::clone(&self.servers),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<B: CommandBridge> Orchestrator<B> {
    /// Create an orchestrator backed by the configured durable store.
    ///
    /// The state file is `config.state_file` when set, otherwise the platform
    /// default from [`DurableStore::default_path`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the state file
    /// exists but cannot be read.
    pub async fn new(bridge: B, config: UpdaterConfig) -> Result<Self> {
        let path = match &config.state_file {
            Some(path) => path.clone(),
            None => DurableStore::default_path()?,
        };
        let store = DurableStore::open(&path)
            .await
            .with_context(|| format!("Failed to open durable store at {}", path.display()))?;
        Self::with_store(Arc::new(bridge), config, Arc::new(store)).await
    }

    /// Create an orchestrator around an already opened store.
    ///
    /// Several orchestrators may share one store; the installed version is read
    /// from it once, here.
    pub async fn with_store(
        bridge: Arc<B>,
        config: UpdaterConfig,
        store: Arc<DurableStore>,
    ) -> Result<Self> {
        config.validate()?;

        let installed_version = store.installed_version().await;
        debug!(
            url = %config.manifest_url,
            dir = %config.install_dir.display(),
            installed = ?installed_version,
            "Created orchestrator"
        );

        Ok(Self {
            bridge,
            config: Arc::new(config),
            state: Arc::new(StateStore::new(installed_version)),
            store,
            manifests: Arc::new(RequestDeduplicator::new()),
            servers: Arc::new(RequestDeduplicator::new()),
            locks: Arc::new(DirectoryLocks::new()),
        })
    }

    /// Configuration this orchestrator was built with.
    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    /// The backend bridge.
    pub fn bridge(&self) -> &Arc<B> {
        &self.bridge
    }

    /// The durable store holding the installed version.
    pub fn store(&self) -> &Arc<DurableStore> {
        &self.store
    }

    /// Consistent copy of the orchestration state.
    pub fn snapshot(&self) -> OrchestrationState {
        self.state.snapshot()
    }

    /// Receiver notified after every state change.
    pub fn subscribe(&self) -> watch::Receiver<OrchestrationState> {
        self.state.subscribe()
    }

    /// Number of manifest fetches that joined an in-flight fetch.
    pub fn coalesced_fetches(&self) -> u64 {
        self.manifests.coalesced_count()
    }

    /// Whether install or repair currently holds the install directory.
    pub fn is_directory_locked(&self) -> bool {
        self.locks.is_locked(&self.config.install_dir)
    }

    /// Clear every transient field of the state.
    ///
    /// `installed_version` is kept; it always reflects the durable store.
    pub fn reset(&self) {
        debug!("Resetting orchestration state");
        self.state.reset();
    }
}
