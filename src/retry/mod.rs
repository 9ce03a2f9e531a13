//! Exponential backoff with jitter and bounded retry bookkeeping.
//!
//! [`RetryPolicy`] is a plain value describing the delay curve and the retry
//! bound; [`RetryState`] tracks how many consecutive failures a single use site
//! has seen. Each use site (the startup manifest check, the silent
//! verification pass) owns its own pair, there is no global retry budget.
//!
//! ```text
//! delay(attempt) = min(base_delay * multiplier^attempt, max_delay)   [* jitter]
//! ```
//!
//! # Example
//!
//! ```rust
//! use packsync::retry::{RetryPolicy, RetryState};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy {
//!     jitter: false,
//!     ..RetryPolicy::default()
//! };
//! let mut state = RetryState::new(policy);
//!
//! while state.can_retry() {
//!     state.record_failure();
//! }
//! assert_eq!(state.retry_count(), policy.max_retries);
//! assert!(!state.can_retry());
//!
//! state.reset_retry_count();
//! assert!(state.can_retry());
//! assert_eq!(policy.delay_for(0), Duration::from_secs(1));
//! ```

use crate::constants::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_STARTUP_MAX_RETRIES, MAX_BACKOFF_DELAY_MS,
    STARTING_BACKOFF_DELAY_MS,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay curve and retry bound for one use site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Growth factor applied per failed attempt
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Upper bound on any single delay, in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Number of failures after which the use site gives up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Whether delays are randomised to avoid synchronised retries
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_base_delay_ms() -> u64 {
    STARTING_BACKOFF_DELAY_MS
}

fn default_multiplier() -> f64 {
    DEFAULT_BACKOFF_MULTIPLIER
}

fn default_max_delay_ms() -> u64 {
    MAX_BACKOFF_DELAY_MS
}

fn default_max_retries() -> u32 {
    DEFAULT_STARTUP_MAX_RETRIES
}

fn default_jitter() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            multiplier: default_multiplier(),
            max_delay_ms: default_max_delay_ms(),
            max_retries: default_max_retries(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Same policy with a different retry bound.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Deterministic delay for the given 0-based attempt, before jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.base_delay_ms as f64 * self.multiplier.max(1.0).powi(exponent);
        let capped = if scaled.is_finite() {
            scaled.min(self.max_delay_ms as f64)
        } else {
            self.max_delay_ms as f64
        };
        Duration::from_millis(capped as u64)
    }

    /// Delay to wait before retrying after `attempt` failures, jitter applied.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        if self.jitter {
            tokio_retry::strategy::jitter(delay)
        } else {
            delay
        }
    }
}

/// Consecutive-failure bookkeeping for one use site.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    retry_count: u32,
    last_error_at: Option<DateTime<Utc>>,
}

impl RetryState {
    /// Fresh state with no recorded failures.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retry_count: 0,
            last_error_at: None,
        }
    }

    /// Policy this state was created with.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Consecutive failures recorded since the last reset.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// When the most recent failure was recorded.
    pub fn last_error_at(&self) -> Option<DateTime<Utc>> {
        self.last_error_at
    }

    /// Whether another attempt is allowed.
    ///
    /// Once the bound is reached this stays `false` until
    /// [`reset_retry_count`](Self::reset_retry_count).
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.policy.max_retries
    }

    /// Record a failed attempt and return the delay before the next one.
    pub fn record_failure(&mut self) -> Duration {
        let delay = self.policy.delay_for(self.retry_count);
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error_at = Some(Utc::now());
        delay
    }

    /// Delay that would follow the next recorded failure.
    pub fn next_delay(&self) -> Duration {
        self.policy.delay_for(self.retry_count)
    }

    /// Forget all failures; called after any success.
    pub fn reset_retry_count(&mut self) {
        self.retry_count = 0;
        self.last_error_at = None;
    }
}
