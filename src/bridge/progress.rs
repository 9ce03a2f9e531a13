//! Scoped subscriptions to backend progress events.
//!
//! A [`ProgressSubscription`] is opened right before a backend call and dropped
//! when the call returns, on success, failure, or cancellation alike. Dropping
//! the guard drops the broadcast receiver, which unsubscribes it; repeated
//! install attempts therefore never accumulate listeners.
//!
//! Events are cumulative snapshots. Delivery may duplicate or reorder them, so
//! consumers must overwrite their view with the newest event rather than add
//! deltas.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::debug;

/// Download progress pushed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Files completed so far (1-indexed file currently in flight)
    pub current: usize,
    /// Total files in the operation
    pub total: usize,
    /// Cumulative bytes transferred
    pub current_bytes: u64,
    /// Total bytes in the operation
    pub total_bytes: u64,
    /// File currently being processed
    pub filename: String,
}

/// Progress subscription bound to one backend call.
#[derive(Debug)]
pub struct ProgressSubscription {
    receiver: broadcast::Receiver<ProgressEvent>,
    operation: &'static str,
    received: u64,
}

impl ProgressSubscription {
    /// Wrap a freshly opened receiver for `operation` (used in log output).
    pub fn new(receiver: broadcast::Receiver<ProgressEvent>, operation: &'static str) -> Self {
        debug!(operation, "Subscribed to progress events");
        Self {
            receiver,
            operation,
            received: 0,
        }
    }

    /// Number of events handed to a callback so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Run `call` to completion while feeding every event to `on_event`.
    ///
    /// Events are handed over in arrival order. Anything still queued when the
    /// call finishes is drained before returning, so the final event the backend
    /// emitted is always observed.
    pub async fn drive<F, T>(&mut self, call: F, mut on_event: impl FnMut(&ProgressEvent)) -> T
    where
        F: Future<Output = T>,
    {
        let mut call = std::pin::pin!(call);
        let mut open = true;

        let output = loop {
            tokio::select! {
                biased;
                event = self.receiver.recv(), if open => match event {
                    Ok(event) => {
                        self.received += 1;
                        on_event(&event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(operation = self.operation, skipped, "Progress subscriber lagged");
                    }
                    Err(RecvError::Closed) => open = false,
                },
                output = &mut call => break output,
            }
        };

        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    self.received += 1;
                    on_event(&event);
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(operation = self.operation, skipped, "Progress subscriber lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        output
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        debug!(
            operation = self.operation,
            received = self.received,
            "Progress subscription released"
        );
    }
}
