//! Per-install-directory mutual exclusion.
//!
//! Install and verify-and-repair both rewrite files inside the install
//! directory. They must never run at the same time against the same directory,
//! whichever trigger started them (a button, the post-install repair, a
//! scheduled verification). Every busy operation takes the directory's lock
//! before raising its busy flag and keeps it until the flag is lowered.
//!
//! Locks are keyed by path as given; callers are expected to pass the same
//! configured path every time.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Held directory lock; the directory is released when this is dropped.
#[derive(Debug)]
pub struct DirectoryGuard {
    dir: PathBuf,
    operation: &'static str,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for DirectoryGuard {
    fn drop(&mut self) {
        debug!(dir = %self.dir.display(), operation = self.operation, "Released directory lock");
    }
}

/// Registry of one async mutex per install directory.
#[derive(Debug, Default)]
pub struct DirectoryLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl DirectoryLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `dir`.
    pub async fn acquire(&self, dir: &Path, operation: &'static str) -> DirectoryGuard {
        // Clone the mutex out so the shard lock is not held across the await.
        let mutex = Arc::clone(self.locks.entry(dir.to_path_buf()).or_default().value());

        if mutex.try_lock().is_err() {
            debug!(dir = %dir.display(), operation, "Waiting for directory lock");
        }
        let guard = mutex.lock_owned().await;

        debug!(dir = %dir.display(), operation, "Acquired directory lock");
        DirectoryGuard {
            dir: dir.to_path_buf(),
            operation,
            _guard: guard,
        }
    }

    /// Whether some operation currently holds the lock for `dir`.
    pub fn is_locked(&self, dir: &Path) -> bool {
        self.locks.get(dir).is_some_and(|mutex| mutex.try_lock().is_err())
    }
}
