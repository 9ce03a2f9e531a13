//! Modpack manifest model.
//!
//! A manifest describes the complete file set of one modpack release: every
//! file's relative path, download URL, SHA-256 hash, and size. The backend is
//! responsible for validating URLs and paths; this module only offers the
//! read-only helpers the orchestrator needs to make decisions.
//!
//! # Format
//!
//! ```json
//! {
//!   "version": "1.2.0",
//!   "minecraft_version": "1.20.1",
//!   "fabric_loader": "0.15.7",
//!   "changelog": "Added shaders",
//!   "files": [
//!     {
//!       "path": "mods/sodium.jar",
//!       "url": "https://cdn.example.com/mods/sodium.jar",
//!       "sha256": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
//!       "size": 1048576
//!     }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;

/// One file entry of a modpack manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    /// Path relative to the install directory
    pub path: String,
    /// Download URL
    pub url: String,
    /// Lowercase hex SHA-256 of the file contents
    pub sha256: String,
    /// Size in bytes
    pub size: u64,
}

/// Versioned description of a modpack release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Modpack version string (usually semver, not required to be)
    pub version: String,
    /// Minecraft version the pack targets
    pub minecraft_version: String,
    /// Fabric loader version the pack targets
    pub fabric_loader: String,
    /// Every file that makes up the pack
    pub files: Vec<ManifestFile>,
    /// Release notes shown to the user
    #[serde(default)]
    pub changelog: String,
}

impl Manifest {
    /// A manifest can only be installed when it lists at least one file.
    pub fn is_installable(&self) -> bool {
        !self.files.is_empty()
    }

    /// Total number of bytes the pack occupies on disk.
    pub fn total_size(&self) -> u64 {
        self.files.iter().fold(0u64, |acc, file| acc.saturating_add(file.size))
    }

    /// SHA-256 digest over the pack's file set.
    ///
    /// Entries are sorted by path first so two manifests listing the same files
    /// in a different order produce the same digest. Re-hashing any file, or
    /// changing its size, changes the digest even when `version` stays the same.
    pub fn content_digest(&self) -> String {
        let mut entries: Vec<&ManifestFile> = self.files.iter().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut hasher = Sha256::new();
        for entry in entries {
            hasher.update(entry.path.as_bytes());
            hasher.update([0u8]);
            hasher.update(entry.sha256.to_ascii_lowercase().as_bytes());
            hasher.update([0u8]);
            hasher.update(entry.size.to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// How a newly fetched version relates to the installed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChange {
    /// Both versions parse as semver and the latest is newer
    Upgrade,
    /// Both versions parse as semver and the latest is older (a rollback)
    Downgrade,
    /// The version strings are identical
    Same,
    /// The strings differ but cannot be ordered
    Different,
}

/// Classify the difference between an installed and a fetched version.
///
/// A leading `v` is tolerated on either side. Update availability itself is
/// decided by string inequality; this classification only feeds logging and
/// the presentation layer.
pub fn compare_versions(installed: &str, latest: &str) -> VersionChange {
    if installed == latest {
        return VersionChange::Same;
    }

    let parse = |v: &str| semver::Version::parse(v.trim_start_matches('v')).ok();
    match (parse(installed), parse(latest)) {
        (Some(current), Some(next)) => match next.cmp(&current) {
            Ordering::Greater => VersionChange::Upgrade,
            Ordering::Less => VersionChange::Downgrade,
            Ordering::Equal => VersionChange::Same,
        },
        _ => VersionChange::Different,
    }
}
