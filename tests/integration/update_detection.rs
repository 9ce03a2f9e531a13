//! Version and content change detection.

use anyhow::Result;
use packsync::Orchestrator;
use packsync::manifest::{VersionChange, compare_versions};
use packsync::state::DurableStore;
use packsync::test_utils::{ManifestFixture, MockBridge, test_config, wait_until};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

async fn orchestrator_with_installed(
    bridge: &Arc<MockBridge>,
    installed: &str,
) -> Result<Orchestrator<MockBridge>> {
    let store = Arc::new(DurableStore::in_memory());
    store.set_installed_version(Some(installed)).await?;
    Orchestrator::with_store(Arc::clone(bridge), test_config(Path::new("/games/pack")), store).await
}

#[tokio::test]
async fn test_new_version_is_detected() -> Result<()> {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.1.0")));
    let orchestrator = orchestrator_with_installed(&bridge, "1.0.0").await?;

    orchestrator.check_updates().await?;

    let state = orchestrator.snapshot();
    assert!(state.update_available);
    let installed = state.installed_version.as_deref().unwrap();
    assert_eq!(compare_versions(installed, state.latest_version().unwrap()), VersionChange::Upgrade);
    Ok(())
}

#[tokio::test]
async fn test_rollback_is_also_an_update() -> Result<()> {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("0.9.0")));
    let orchestrator = orchestrator_with_installed(&bridge, "1.0.0").await?;

    orchestrator.check_updates().await?;

    assert!(orchestrator.snapshot().update_available);
    Ok(())
}

#[tokio::test]
async fn test_republished_content_under_same_version() -> Result<()> {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::republished("1.0.0")));
    bridge.set_manifest_changed(true);
    let orchestrator = orchestrator_with_installed(&bridge, "1.0.0").await?;

    orchestrator.check_updates().await?;
    assert!(!orchestrator.snapshot().update_available);

    orchestrator.poll_once().await;

    let state = orchestrator.snapshot();
    assert!(state.update_available);
    assert_eq!(state.installed_version.as_deref(), Some("1.0.0"));
    assert_eq!(bridge.manifest_changed_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_periodic_failures_never_surface() -> Result<()> {
    let bridge = Arc::new(MockBridge::unreachable("network is unreachable"));
    let orchestrator = orchestrator_with_installed(&bridge, "1.0.0").await?;

    for _ in 0..3 {
        orchestrator.poll_once().await;
    }

    let state = orchestrator.snapshot();
    assert_eq!(state.error, None);
    assert_eq!(state.last_silent_error.as_deref(), Some("network is unreachable"));
    assert_eq!(bridge.fetch_calls(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_background_poll_detects_update() -> Result<()> {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    let orchestrator = orchestrator_with_installed(&bridge, "1.0.0").await?;
    let _tasks = orchestrator.spawn_background_tasks();

    tokio::time::sleep(Duration::from_secs(301)).await;
    assert!(wait_until(|| bridge.fetch_calls() == 1).await);
    assert!(!orchestrator.snapshot().update_available);

    bridge.set_manifest(ManifestFixture::with_version("1.1.0"));
    tokio::time::sleep(Duration::from_secs(300)).await;
    assert!(wait_until(|| orchestrator.snapshot().update_available).await);
    assert_eq!(orchestrator.snapshot().latest_version(), Some("1.1.0"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_periodic_verification_runs_when_enabled() -> Result<()> {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    let store = Arc::new(DurableStore::in_memory());
    store.set_installed_version(Some("1.0.0")).await?;
    let mut config = test_config(Path::new("/games/pack"));
    config.check_interval = 0;
    config.verify_interval = 60;
    let orchestrator = Orchestrator::with_store(Arc::clone(&bridge), config, store).await?;

    let tasks = orchestrator.spawn_background_tasks();
    assert_eq!(tasks.len(), 1);

    tokio::time::sleep(Duration::from_secs(125)).await;
    assert!(wait_until(|| bridge.verify_calls() == 2).await);
    assert_eq!(orchestrator.snapshot().error, None);

    drop(tasks);
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(bridge.verify_calls(), 2);
    Ok(())
}
