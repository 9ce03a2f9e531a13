//! Integration test suite for packsync
//!
//! These tests drive a full [`packsync::Orchestrator`] against the scriptable
//! `MockBridge` from `packsync::test_utils` and check the externally observable
//! guarantees: request coalescing, install atomicity, busy-flag exclusion,
//! error lifecycle, retry bounds, and persistence across restarts.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! RUST_LOG=packsync=debug cargo test --test integration -- --nocapture
//! ```
//!
//! # Test Organization
//!
//! - **busy_exclusion**: at most one busy flag, install and repair never overlap
//! - **dedup**: concurrent and back-to-back manual checks
//! - **install_lifecycle**: fresh install, rejected install, persistence
//! - **retry**: retry bounds and startup retry exhaustion
//! - **update_detection**: version and content change detection, periodic polling

mod busy_exclusion;
mod dedup;
mod install_lifecycle;
mod retry;
mod update_detection;
