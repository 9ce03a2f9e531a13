//! packsync - modpack update and installation orchestrator
//!
//! A launcher-side library that decides when a newer modpack is available,
//! installs it exactly once even when several triggers fire at the same time,
//! keeps the installed files healthy in the background, and exposes progress
//! and errors to a presentation layer through a single observable state.
//!
//! # Architecture Overview
//!
//! packsync owns orchestration only. Everything that touches the network or
//! the install directory lives in a backend the host provides:
//!
//! ```text
//!  presentation layer ──snapshot / subscribe──► StateStore (watch channel)
//!          │                                          ▲
//!          ▼                                          │ mutations
//!   Orchestrator ──► RequestDeduplicator ──► CommandBridge (host backend)
//!          │                                          │
//!          ├── DirectoryLocks (install ⟂ repair)      └── progress broadcast
//!          └── RetryPolicy / RetryState per use site
//! ```
//!
//! - Manifest fetches are coalesced by URL: N concurrent checks cause one
//!   backend call and all N callers receive the same `Arc<Manifest>`.
//! - Install and repair serialize on a per-directory lock, and at most one of
//!   the three busy flags is ever raised.
//! - A failed install never changes the installed version.
//! - Only the installed version is persisted across restarts.
//!
//! # Core Modules
//!
//! - [`bridge`] - The backend trait and scoped progress subscriptions
//! - [`orchestrator`] - Update checks, install, verify and repair, server status
//! - [`dedup`] - At-most-one-in-flight request coalescing
//! - [`state`] - Observable orchestration state and the durable store
//! - [`retry`] - Exponential backoff with jitter and bounded retry bookkeeping
//! - [`manifest`] - Modpack manifest model, content digests, version comparison
//!
//! ## Supporting Modules
//! - [`config`] - TOML configuration (`PACKSYNC_CONFIG_PATH` or platform default)
//! - [`core`] - Error types
//! - [`constants`] - Default intervals, retry bounds, and storage keys
//! - [`logging`] - Optional `tracing-subscriber` setup
//!
//! # Configuration
//!
//! ```toml
//! manifest_url = "https://packs.example.com/manifest.json"
//! install_dir = "/home/steve/.wowid3/game"
//! check_interval = 300
//! ```

pub mod bridge;
pub mod config;
pub mod constants;
pub mod core;
pub mod dedup;
pub mod logging;
pub mod manifest;
pub mod orchestrator;
pub mod retry;
pub mod state;

// Test utilities (only available in tests or with test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use crate::core::{BridgeError, PacksyncError};
pub use orchestrator::{InstallOptions, Orchestrator, VerifyOptions};
