//! Sample manifests and configurations.

use crate::bridge::ProgressEvent;
use crate::config::UpdaterConfig;
use crate::manifest::{Manifest, ManifestFile};
use crate::retry::RetryPolicy;
use std::path::Path;

/// Manifest URL used by every fixture configuration.
pub const MANIFEST_URL: &str = "https://packs.example.com/wowid3/manifest.json";

/// Builders for [`Manifest`] values.
pub struct ManifestFixture;

impl ManifestFixture {
    /// Two-file modpack at `version`.
    pub fn with_version(version: &str) -> Manifest {
        Manifest {
            version: version.to_string(),
            minecraft_version: "1.20.1".to_string(),
            fabric_loader: "0.15.7".to_string(),
            files: vec![
                Self::file("mods/sodium.jar", 'a', 600),
                Self::file("config/sodium-options.json", 'b', 400),
            ],
            changelog: format!("Release {version}"),
        }
    }

    /// Same version as [`with_version`](Self::with_version), one file re-hashed.
    pub fn republished(version: &str) -> Manifest {
        let mut manifest = Self::with_version(version);
        manifest.files[0].sha256 = "c".repeat(64);
        manifest
    }

    /// Manifest listing no files.
    pub fn empty(version: &str) -> Manifest {
        Manifest {
            files: Vec::new(),
            ..Self::with_version(version)
        }
    }

    /// One manifest entry whose hash is `hash_char` repeated.
    pub fn file(path: &str, hash_char: char, size: u64) -> ManifestFile {
        ManifestFile {
            path: path.to_string(),
            url: format!("https://cdn.example.com/{path}"),
            sha256: hash_char.to_string().repeat(64),
            size,
        }
    }

    /// Progress events covering `manifest` file by file, cumulative bytes.
    pub fn progress_for(manifest: &Manifest) -> Vec<ProgressEvent> {
        let total_bytes = manifest.total_size();
        let mut current_bytes = 0;
        manifest
            .files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                current_bytes += file.size;
                ProgressEvent {
                    current: index + 1,
                    total: manifest.files.len(),
                    current_bytes,
                    total_bytes,
                    filename: file.path.clone(),
                }
            })
            .collect()
    }
}

/// Retry policy without jitter and with millisecond delays.
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        base_delay_ms: 10,
        multiplier: 2.0,
        max_delay_ms: 100,
        max_retries,
        jitter: false,
    }
}

/// Configuration for `install_dir` with fast, deterministic retries.
pub fn test_config(install_dir: &Path) -> UpdaterConfig {
    UpdaterConfig {
        startup_retry: fast_retry(3),
        verify_retry: fast_retry(2),
        ..UpdaterConfig::new(MANIFEST_URL, install_dir)
    }
}
