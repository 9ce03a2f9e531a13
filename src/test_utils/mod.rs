//! Test utilities for packsync
//!
//! This module provides a scriptable backend, fixtures, and helpers for writing
//! orchestrator tests. It is compiled for unit tests and, through the
//! `test-utils` feature, for the integration tests.
//!
//! # Example
//!
//! ```rust,no_run
//! use packsync::orchestrator::Orchestrator;
//! use packsync::state::DurableStore;
//! use packsync::test_utils::{ManifestFixture, MockBridge, test_config};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
//! let orchestrator = Orchestrator::with_store(
//!     Arc::clone(&bridge),
//!     test_config(Path::new("/games/pack")),
//!     Arc::new(DurableStore::in_memory()),
//! )
//! .await?;
//!
//! orchestrator.check_updates().await?;
//! assert_eq!(bridge.fetch_calls(), 1);
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod mock_bridge;

pub use fixtures::{MANIFEST_URL, ManifestFixture, fast_retry, test_config};
pub use mock_bridge::{CallCounts, Delays, MockBridge};

use crate::orchestrator::Orchestrator;
use crate::state::DurableStore;
use std::path::Path;
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has any effect. The provided level wins; otherwise
/// `RUST_LOG` is honoured, and without either nothing is logged.
///
/// ```bash
/// RUST_LOG=packsync=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// Orchestrator over `bridge` with an in-memory store and the test config.
pub async fn test_orchestrator(
    bridge: &Arc<MockBridge>,
    install_dir: &Path,
) -> Orchestrator<MockBridge> {
    init_test_logging(None);
    Orchestrator::with_store(
        Arc::clone(bridge),
        test_config(install_dir),
        Arc::new(DurableStore::in_memory()),
    )
    .await
    .expect("test config is valid")
}

/// Poll `condition` every few milliseconds until it holds or two seconds pass.
///
/// Returns whether the condition held. Works with paused time too, since each
/// sleep auto-advances the clock.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
