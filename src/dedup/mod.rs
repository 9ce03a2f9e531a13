//! Request deduplication (at-most-one-in-flight per key).
//!
//! When several triggers fire the same logical request at once (a mount-time
//! check racing a "check now" button, or the periodic poll landing mid-way
//! through a manual check), only the first caller runs the request. Everyone
//! else subscribes to its outcome and receives a clone of the same settled
//! value or the same error.
//!
//! # Coordination protocol
//!
//! ```text
//! caller ──► DashMap entry(key)
//!              ├── Vacant   → insert broadcast sender, run factory, evict key, broadcast result
//!              └── Occupied → subscribe, wait for the broadcast
//!                               └── sender dropped without a result (leader cancelled)
//!                                     → start over; one waiter becomes the new leader
//! ```
//!
//! Keys are evicted the moment the leading call settles, before the result is
//! broadcast, so a call made after settlement always starts a fresh request.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// In-flight request registered under a key.
struct Inflight<T, E> {
    /// Distinguishes this request from a later one under the same key
    id: u64,
    sender: broadcast::Sender<Result<T, E>>,
}

/// Evicts the in-flight entry when the leading call settles or is dropped.
struct InflightGuard<'a, T, E> {
    inflight: &'a DashMap<String, Inflight<T, E>>,
    key: &'a str,
    id: u64,
}

impl<T, E> Drop for InflightGuard<'_, T, E> {
    fn drop(&mut self) {
        self.inflight.remove_if(self.key, |_, entry| entry.id == self.id);
    }
}

/// Coalesces concurrent requests that share a key.
///
/// `T` and `E` must be `Clone` because every waiter receives its own copy of
/// the settled result. Wrap large values in an [`Arc`] so that waiters share a
/// single allocation.
pub struct RequestDeduplicator<T, E> {
    inflight: Arc<DashMap<String, Inflight<T, E>>>,
    next_id: AtomicU64,
    coalesced: AtomicU64,
}

impl<T, E> RequestDeduplicator<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Create an empty deduplicator.
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// Run `factory` unless a request for `key` is already in flight.
    ///
    /// If one is, `factory` is never invoked and the caller receives the
    /// in-flight request's result instead.
    pub async fn execute<F, Fut>(&self, key: &str, factory: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (id, sender) = loop {
            let mut receiver = match self.inflight.entry(key.to_string()) {
                Entry::Occupied(entry) => {
                    // Subscribe while the shard lock is held so the leader
                    // cannot evict and broadcast in between.
                    let receiver = entry.get().sender.subscribe();
                    drop(entry);
                    receiver
                }
                Entry::Vacant(entry) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let (sender, _) = broadcast::channel(1);
                    entry.insert(Inflight {
                        id,
                        sender: sender.clone(),
                    });
                    break (id, sender);
                }
            };

            self.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(key, "Joining in-flight request");

            match receiver.recv().await {
                Ok(result) => return result,
                Err(_) => {
                    debug!(key, "In-flight request was abandoned, retrying");
                }
            }
        };

        let guard = InflightGuard {
            inflight: &self.inflight,
            key,
            id,
        };

        let result = factory().await;

        drop(guard);
        // No receivers just means nobody joined.
        let _ = sender.send(result.clone());

        result
    }

    /// Whether a request for `key` is currently running.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.inflight.contains_key(key)
    }

    /// Number of distinct keys currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Total number of calls that joined another caller's request.
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

impl<T, E> Default for RequestDeduplicator<T, E>
where
    T: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
