//! Error handling for packsync
//!
//! The orchestrator distinguishes failures by where they came from, but the
//! presentation layer only needs a message: backend failures therefore display
//! as the backend's own text, so the value stored in the shared `error` field is
//! exactly what the backend reported.
//!
//! # Error Categories
//!
//! - **Preconditions**: [`PacksyncError::NoManifest`], [`PacksyncError::EmptyManifest`]
//! - **Backend**: [`PacksyncError::Fetch`], [`PacksyncError::Install`],
//!   [`PacksyncError::Verify`], [`PacksyncError::Ping`]
//! - **Configuration**: [`PacksyncError::Config`]
//!
//! Every variant is `Clone` so a single failure can be handed to every caller
//! that joined a deduplicated request.
//!
//! # Examples
//!
//! ```rust
//! use packsync::core::{PacksyncError, BridgeError};
//!
//! let err = PacksyncError::install("1.0.0", BridgeError::new("Install failed"));
//! assert_eq!(err.to_string(), "Install failed");
//! assert!(err.is_backend_failure());
//! ```

use thiserror::Error;

/// Opaque failure reported by the command bridge.
///
/// The backend owns the taxonomy of network, hash-mismatch, disk-space, and
/// permission failures; this layer only carries the message through.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BridgeError {
    /// Human-readable message produced by the backend
    pub message: String,
}

impl BridgeError {
    /// Create a bridge error from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for BridgeError {
    fn from(message: String) -> Self {
        Self {
            message,
        }
    }
}

impl From<&str> for BridgeError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Errors produced by the update orchestrator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PacksyncError {
    /// Install was requested before any manifest was fetched.
    #[error("No modpack manifest has been fetched yet")]
    NoManifest,

    /// The fetched manifest lists no files and cannot be installed.
    #[error("Modpack manifest {version} lists no files")]
    EmptyManifest {
        /// Version string of the offending manifest
        version: String,
    },

    /// Fetching or parsing the manifest failed in the backend.
    #[error("{message}")]
    Fetch {
        /// URL the manifest was requested from
        url: String,
        /// Backend failure message
        message: String,
    },

    /// The backend install call failed.
    ///
    /// May wrap a hash mismatch, a full disk, or a permission problem.
    #[error("{message}")]
    Install {
        /// Version that was being installed
        version: String,
        /// Backend failure message
        message: String,
    },

    /// The backend verify-and-repair call failed.
    #[error("{message}")]
    Verify {
        /// Backend failure message
        message: String,
    },

    /// Pinging a game server failed.
    #[error("{message}")]
    Ping {
        /// Server address that was pinged
        address: String,
        /// Backend failure message
        message: String,
    },

    /// Configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },
}

impl PacksyncError {
    /// Wrap a bridge failure raised while fetching `url`.
    pub fn fetch(url: impl Into<String>, source: BridgeError) -> Self {
        Self::Fetch {
            url: url.into(),
            message: source.message,
        }
    }

    /// Wrap a bridge failure raised while installing `version`.
    pub fn install(version: impl Into<String>, source: BridgeError) -> Self {
        Self::Install {
            version: version.into(),
            message: source.message,
        }
    }

    /// Wrap a bridge failure raised by verify-and-repair.
    pub fn verify(source: BridgeError) -> Self {
        Self::Verify {
            message: source.message,
        }
    }

    /// Wrap a bridge failure raised while pinging `address`.
    pub fn ping(address: impl Into<String>, source: BridgeError) -> Self {
        Self::Ping {
            address: address.into(),
            message: source.message,
        }
    }

    /// Whether the failure originated in the command bridge.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Install { .. } | Self::Verify { .. } | Self::Ping { .. }
        )
    }

    /// Whether the failure is a violated precondition rather than a runtime error.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::NoManifest | Self::EmptyManifest { .. })
    }
}

/// Result alias used by orchestrator operations.
pub type Result<T, E = PacksyncError> = std::result::Result<T, E>;
