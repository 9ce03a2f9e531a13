//! Logging setup for hosts that do not install their own subscriber.
//!
//! Everything in this crate logs through [`tracing`]. A host that already has a
//! subscriber needs nothing from this module; otherwise call [`init`] once at
//! startup.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install a formatted subscriber filtered by `RUST_LOG`.
///
/// Without `RUST_LOG`, `packsync` logs at `level` and everything else at
/// `warn`. Returns `false` if a global subscriber was already installed.
pub fn init(level: Level) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init().is_ok()
}

fn default_directives(level: Level) -> String {
    format!("warn,packsync={}", level.as_str().to_ascii_lowercase())
}
