//! Retry bounds at the policy level and through the startup check.

use packsync::retry::{RetryPolicy, RetryState};
use packsync::test_utils::{ManifestFixture, MockBridge, fast_retry, test_orchestrator};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_can_retry_false_after_max_failures_until_reset() {
    let mut state = RetryState::new(fast_retry(4));

    for _ in 0..4 {
        assert!(state.can_retry());
        state.record_failure();
    }
    for _ in 0..3 {
        assert!(!state.can_retry());
    }

    state.reset_retry_count();
    assert!(state.can_retry());
}

#[test]
fn test_use_sites_keep_independent_state() {
    let policy = fast_retry(1);
    let mut startup = RetryState::new(policy);
    let verify = RetryState::new(policy);

    startup.record_failure();

    assert!(!startup.can_retry());
    assert!(verify.can_retry());
}

#[test]
fn test_default_policy_delays_are_capped() {
    let policy = RetryPolicy {
        jitter: false,
        max_retries: 10,
        ..RetryPolicy::default()
    };

    let delays: Vec<_> =
        (0..policy.max_retries).map(|attempt| policy.delay_for(attempt)).collect();
    assert_eq!(delays[0], Duration::from_secs(1));
    assert_eq!(delays[1], Duration::from_secs(2));
    assert!(delays.iter().all(|d| *d <= Duration::from_secs(30)));
    assert_eq!(delays[9], Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_startup_check_exhaustion_leaves_persistent_error() {
    let bridge = Arc::new(MockBridge::unreachable("Failed to fetch manifest: timed out"));
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;

    assert!(orchestrator.startup_check().await.is_err());

    let state = orchestrator.snapshot();
    assert_eq!(state.error.as_deref(), Some("Failed to fetch manifest: timed out"));
    assert_eq!(state.check_retries, 3);
    assert!(state.has_checked_for_modpack);

    // Background polls that fail afterwards do not clear or replace it.
    orchestrator.poll_once().await;
    assert_eq!(
        orchestrator.snapshot().error.as_deref(),
        Some("Failed to fetch manifest: timed out")
    );

    // A successful manual check does.
    bridge.set_manifest(ManifestFixture::with_version("1.0.0"));
    orchestrator.check_updates().await.unwrap();
    assert_eq!(orchestrator.snapshot().error, None);
}

#[tokio::test(start_paused = true)]
async fn test_startup_check_waits_between_attempts() {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    bridge.fail_next_fetches(2, "temporarily unavailable");
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;

    let start = tokio::time::Instant::now();
    orchestrator.startup_check().await.unwrap();

    // fast_retry: 10 ms then 20 ms.
    assert!(start.elapsed() >= Duration::from_millis(30));
    assert_eq!(bridge.fetch_calls(), 3);
}
