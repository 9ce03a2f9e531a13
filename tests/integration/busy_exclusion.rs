//! Busy-flag mutual exclusion and install/repair serialization.

use packsync::state::OrchestrationState;
use packsync::test_utils::{Delays, ManifestFixture, MockBridge, test_orchestrator, wait_until};
use packsync::{InstallOptions, VerifyOptions};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Record the highest busy-flag count seen on every state change.
fn watch_busy_flags(
    mut receiver: watch::Receiver<OrchestrationState>,
) -> (Arc<AtomicUsize>, JoinHandle<()>) {
    let max_seen = Arc::new(AtomicUsize::new(0));
    let handle = {
        let max_seen = Arc::clone(&max_seen);
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let count = receiver.borrow_and_update().busy_flag_count();
                max_seen.fetch_max(count, Ordering::SeqCst);
            }
        })
    };
    (max_seen, handle)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_at_most_one_busy_flag_under_contention() {
    let manifest = ManifestFixture::with_version("2.0.0");
    let bridge = Arc::new(MockBridge::new(manifest.clone()));
    bridge.set_progress_script(ManifestFixture::progress_for(&manifest));
    bridge.set_delays(Delays {
        install: Duration::from_millis(20),
        verify: Duration::from_millis(20),
        ..Delays::default()
    });
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;
    orchestrator.check_updates().await.unwrap();

    let (max_seen, watcher) = watch_busy_flags(orchestrator.subscribe());

    let mut handles = Vec::new();
    for i in 0..6 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            match i % 3 {
                0 => orchestrator.install(InstallOptions::blocking()).await.map(|_| ()),
                1 => orchestrator.install(InstallOptions::voluntary()).await.map(|_| ()),
                _ => orchestrator.verify_and_repair(VerifyOptions::manual()).await.map(|_| ()),
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    // Two manual repairs plus one silent pass per successful install.
    assert!(wait_until(|| bridge.verify_calls() == 6).await);
    assert!(wait_until(|| !orchestrator.snapshot().is_busy()).await);

    watcher.abort();
    assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.max_concurrent_writers(), 1);
}

#[tokio::test]
async fn test_repair_waits_for_running_install() {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    bridge.set_delays(Delays {
        install: Duration::from_millis(100),
        ..Delays::default()
    });
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;
    orchestrator.check_updates().await.unwrap();

    let (install, repair) = tokio::join!(
        orchestrator.install(InstallOptions::voluntary()),
        orchestrator.verify_and_repair(VerifyOptions::manual())
    );

    install.unwrap();
    assert_eq!(repair.unwrap().as_deref(), Some("Verified"));
    assert_eq!(bridge.max_concurrent_writers(), 1);
    assert!(!orchestrator.snapshot().is_busy());
}

#[tokio::test]
async fn test_silent_verify_does_not_touch_foreground_state() {
    let manifest = ManifestFixture::with_version("1.0.0");
    let bridge = Arc::new(MockBridge::new(manifest.clone()));
    bridge.set_progress_script(ManifestFixture::progress_for(&manifest));
    bridge.set_delays(Delays {
        verify: Duration::from_millis(100),
        ..Delays::default()
    });
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;
    orchestrator.check_updates().await.unwrap();
    orchestrator.install(InstallOptions::voluntary()).await.unwrap();

    // Post-install verification runs in the background.
    let mut receiver = orchestrator.subscribe();
    receiver
        .wait_for(|state| state.is_verifying)
        .await
        .unwrap();

    let state = orchestrator.snapshot();
    assert!(!state.is_downloading);
    assert!(!state.is_blocked_for_install);
    assert_eq!(state.download_progress, None);
    assert_eq!(bridge.progress_subscribers(), 0);

    receiver.wait_for(|state| !state.is_busy()).await.unwrap();
    assert_eq!(bridge.verify_calls(), 1);
}
