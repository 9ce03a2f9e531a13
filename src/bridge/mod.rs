//! Command bridge to the native backend.
//!
//! The orchestrator never touches the network or the install directory
//! itself. Downloading, hashing, path validation, and disk writes all happen in
//! a backend the host application provides by implementing [`CommandBridge`].
//! Progress is pushed by the backend over a broadcast channel; the orchestrator
//! subscribes for the lifetime of a single call (see [`progress`]).
//!
//! # Implementing a bridge
//!
//! ```rust,no_run
//! use packsync::bridge::{CommandBridge, ProgressEvent, ServerStatus};
//! use packsync::core::BridgeError;
//! use packsync::manifest::Manifest;
//! use std::path::Path;
//! use tokio::sync::broadcast;
//!
//! struct Backend {
//!     progress: broadcast::Sender<ProgressEvent>,
//! }
//!
//! impl CommandBridge for Backend {
//!     async fn fetch_manifest(&self, url: &str) -> Result<Manifest, BridgeError> {
//!         Err(BridgeError::new(format!("offline: {url}")))
//!     }
//!     async fn get_installed_version(&self, _dir: &Path) -> Result<Option<String>, BridgeError> {
//!         Ok(None)
//!     }
//!     async fn install(&self, _m: &Manifest, _dir: &Path) -> Result<String, BridgeError> {
//!         Ok("Modpack installed successfully".to_string())
//!     }
//!     async fn verify_and_repair(&self, _m: &Manifest, _dir: &Path) -> Result<String, BridgeError> {
//!         Ok("Verified".to_string())
//!     }
//!     async fn manifest_changed(&self, _m: &Manifest, _dir: &Path) -> Result<bool, BridgeError> {
//!         Ok(false)
//!     }
//!     async fn ping_server(&self, _address: &str) -> Result<ServerStatus, BridgeError> {
//!         Ok(ServerStatus::offline())
//!     }
//!     fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
//!         self.progress.subscribe()
//!     }
//! }
//! ```

pub mod progress;

use crate::core::BridgeError;
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use tokio::sync::broadcast;

pub use progress::{ProgressEvent, ProgressSubscription};

/// Status reported by a game server ping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Whether the server answered
    pub online: bool,
    /// Players currently connected
    pub player_count: Option<u32>,
    /// Server capacity
    pub max_players: Option<u32>,
    /// Names of connected players
    #[serde(default)]
    pub players: Vec<String>,
    /// Server version string
    pub version: Option<String>,
    /// Message of the day
    pub motd: Option<String>,
}

impl ServerStatus {
    /// Status of a server that did not answer.
    pub fn offline() -> Self {
        Self::default()
    }
}

/// Operations the native backend exposes to the orchestrator.
///
/// All operations are asynchronous and may take arbitrarily long; the
/// orchestrator never assumes any of them is cancellable. Implementations must
/// not leave partially written files behind when `install` or
/// `verify_and_repair` fails.
pub trait CommandBridge: Send + Sync + 'static {
    /// Download and parse the manifest at `url`.
    fn fetch_manifest(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Manifest, BridgeError>> + Send;

    /// Read the version currently present in `dir`, if any.
    fn get_installed_version(
        &self,
        dir: &Path,
    ) -> impl Future<Output = Result<Option<String>, BridgeError>> + Send;

    /// Install every file of `manifest` into `dir`, emitting progress events.
    fn install(
        &self,
        manifest: &Manifest,
        dir: &Path,
    ) -> impl Future<Output = Result<String, BridgeError>> + Send;

    /// Re-hash every file in `dir` and re-download anything missing or corrupt.
    fn verify_and_repair(
        &self,
        manifest: &Manifest,
        dir: &Path,
    ) -> impl Future<Output = Result<String, BridgeError>> + Send;

    /// Whether the files in `dir` differ from what `manifest` describes.
    fn manifest_changed(
        &self,
        manifest: &Manifest,
        dir: &Path,
    ) -> impl Future<Output = Result<bool, BridgeError>> + Send;

    /// Query a game server's status.
    fn ping_server(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<ServerStatus, BridgeError>> + Send;

    /// Open a new subscription to the download-progress topic.
    fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent>;
}
