//! Global constants used throughout the packsync codebase.
//!
//! Timeouts, intervals, and retry parameters shared by several modules live
//! here so magic numbers stay discoverable.

/// Default interval between periodic manifest polls (5 minutes).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Default interval between periodic silent verification passes.
///
/// Zero disables the periodic pass; verification still runs after installs.
pub const DEFAULT_VERIFY_INTERVAL_SECS: u64 = 0;

/// Default retry bound for the startup manifest check.
pub const DEFAULT_STARTUP_MAX_RETRIES: u32 = 3;

/// Default retry bound for silent background verification.
pub const DEFAULT_VERIFY_MAX_RETRIES: u32 = 2;

/// Starting delay for exponential backoff (1 second).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 1_000;

/// Maximum backoff delay for exponential backoff (30 seconds).
///
/// Delays are capped at this value no matter how many attempts failed.
pub const MAX_BACKOFF_DELAY_MS: u64 = 30_000;

/// Growth factor applied to the delay after each failed attempt.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Capacity of the progress broadcast channel used by bridge implementations.
///
/// Slow subscribers that fall further behind than this skip to the newest
/// events, which is safe because every event is a cumulative snapshot.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;

/// Namespaced key under which the installed modpack version is persisted.
pub const INSTALLED_VERSION_KEY: &str = "packsync.installed_version";

/// File name of the durable state store inside the data directory.
pub const STATE_FILE_NAME: &str = "state.json";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV: &str = "PACKSYNC_CONFIG_PATH";
