//! Manifest fetch coalescing across concurrent triggers.

use futures::future::join_all;
use packsync::test_utils::{Delays, ManifestFixture, MockBridge, test_orchestrator};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn slow_bridge(version: &str) -> Arc<MockBridge> {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version(version)));
    bridge.set_delays(Delays {
        fetch: Duration::from_millis(50),
        ..Delays::default()
    });
    bridge
}

#[tokio::test]
async fn test_concurrent_checks_share_one_fetch() {
    let bridge = slow_bridge("1.0.0");
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;

    let results = join_all((0..8).map(|_| orchestrator.check_updates())).await;
    let manifests: Vec<_> = results.into_iter().map(Result::unwrap).collect();

    assert_eq!(bridge.fetch_calls(), 1);
    assert!(manifests.iter().all(|m| Arc::ptr_eq(m, &manifests[0])));
    assert_eq!(orchestrator.coalesced_fetches(), 7);

    let state = orchestrator.snapshot();
    assert!(Arc::ptr_eq(state.latest_manifest.as_ref().unwrap(), &manifests[0]));
}

#[tokio::test]
async fn test_concurrent_failures_are_shared() {
    let bridge = slow_bridge("1.0.0");
    bridge.set_fetch_error("503 Service Unavailable");
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;

    let (a, b, c) = tokio::join!(
        orchestrator.check_updates(),
        orchestrator.check_updates(),
        orchestrator.check_updates()
    );

    assert_eq!(bridge.fetch_calls(), 1);
    assert_eq!(a.unwrap_err(), b.clone().unwrap_err());
    assert_eq!(b.unwrap_err(), c.unwrap_err());
    assert_eq!(orchestrator.snapshot().error.as_deref(), Some("503 Service Unavailable"));
}

#[tokio::test]
async fn test_background_poll_joins_manual_check() {
    let bridge = slow_bridge("1.1.0");
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;

    let (manual, ()) = tokio::join!(orchestrator.check_updates(), orchestrator.poll_once());

    assert!(manual.is_ok());
    assert_eq!(bridge.fetch_calls(), 1);
}

#[tokio::test]
async fn test_sequential_checks_fetch_each_time() {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;

    let first = orchestrator.check_updates().await.unwrap();
    bridge.set_manifest(ManifestFixture::with_version("1.0.1"));
    let second = orchestrator.check_updates().await.unwrap();
    let third = orchestrator.check_updates().await.unwrap();

    assert_eq!(bridge.fetch_calls(), 3);
    assert_eq!(first.version, "1.0.0");
    assert_eq!(second.version, "1.0.1");
    assert!(!Arc::ptr_eq(&second, &third));

    let state = orchestrator.snapshot();
    assert_eq!(state.latest_version(), Some("1.0.1"));
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn test_server_pings_coalesce_per_address() {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    bridge.set_delays(Delays {
        ping: Duration::from_millis(30),
        ..Delays::default()
    });
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;

    let (a, b, c) = tokio::join!(
        orchestrator.server_status("play.example.com"),
        orchestrator.server_status("play.example.com"),
        orchestrator.server_status("backup.example.com")
    );

    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(bridge.ping_calls(), 2);
}
