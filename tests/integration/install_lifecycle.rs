//! Install outcomes as seen through the orchestration state.

use anyhow::Result;
use packsync::state::DurableStore;
use packsync::test_utils::{
    Delays, ManifestFixture, MockBridge, test_config, test_orchestrator, wait_until,
};
use packsync::{InstallOptions, Orchestrator, PacksyncError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[tokio::test]
async fn test_fresh_install() {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;
    assert_eq!(orchestrator.snapshot().installed_version, None);

    orchestrator.check_updates().await.unwrap();
    assert!(!orchestrator.snapshot().update_available);

    orchestrator.install(InstallOptions::blocking()).await.unwrap();

    let state = orchestrator.snapshot();
    assert_eq!(state.installed_version.as_deref(), Some("1.0.0"));
    assert!(!state.update_available);
    assert!(!state.is_blocked_for_install);
    assert!(!state.is_downloading);
    assert_eq!(state.download_progress, None);
    assert_eq!(state.error, None);
    assert_eq!(bridge.install_calls(), 1);
}

#[tokio::test]
async fn test_rejected_install_leaves_state_untouched() {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    bridge.set_install_error("Install failed");
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;
    orchestrator.check_updates().await.unwrap();

    let err = orchestrator.install(InstallOptions::voluntary()).await.unwrap_err();

    let state = orchestrator.snapshot();
    assert_eq!(err.to_string(), "Install failed");
    assert_eq!(state.error.as_deref(), Some("Install failed"));
    assert_eq!(state.installed_version, None);
    assert!(!state.is_downloading);
    assert!(!state.is_blocked_for_install);
    assert_eq!(state.download_progress, None);
    assert_eq!(bridge.progress_subscribers(), 0);
}

#[tokio::test]
async fn test_retrying_install_clears_previous_error() {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    bridge.set_install_error("Connection reset");
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;
    orchestrator.check_updates().await.unwrap();
    orchestrator.install(InstallOptions::voluntary()).await.unwrap_err();
    assert!(orchestrator.snapshot().error.is_some());

    bridge.set_install_ok();
    bridge.set_delays(Delays {
        install: Duration::from_millis(100),
        ..Delays::default()
    });
    let install = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.install(InstallOptions::voluntary()).await })
    };

    assert!(wait_until(|| bridge.install_calls() == 2).await);
    let state = orchestrator.snapshot();
    assert!(state.is_downloading);
    assert_eq!(state.error, None);

    install.await.unwrap().unwrap();
    assert_eq!(orchestrator.snapshot().installed_version.as_deref(), Some("1.0.0"));
}

#[tokio::test]
async fn test_repeated_installs_do_not_accumulate_subscriptions() {
    let manifest = ManifestFixture::with_version("1.0.0");
    let bridge = Arc::new(MockBridge::new(manifest.clone()));
    bridge.set_progress_script(ManifestFixture::progress_for(&manifest));
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;
    orchestrator.check_updates().await.unwrap();

    for attempt in 0..3 {
        if attempt % 2 == 0 {
            bridge.set_install_error("Checksum mismatch");
        } else {
            bridge.set_install_ok();
        }
        let _ = orchestrator.install(InstallOptions::voluntary()).await;
        assert_eq!(bridge.progress_subscribers(), 0);
    }
}

#[tokio::test]
async fn test_cancelled_install_releases_everything() {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    bridge.set_delays(Delays {
        install: Duration::from_secs(60),
        ..Delays::default()
    });
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;
    orchestrator.check_updates().await.unwrap();

    let install = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.install(InstallOptions::blocking()).await })
    };
    assert!(wait_until(|| orchestrator.snapshot().is_blocked_for_install).await);

    install.abort();
    assert!(install.await.unwrap_err().is_cancelled());

    let state = orchestrator.snapshot();
    assert!(!state.is_busy());
    assert_eq!(state.download_progress, None);
    assert_eq!(state.installed_version, None);
    assert_eq!(bridge.progress_subscribers(), 0);
    assert!(!orchestrator.is_directory_locked());
}

#[tokio::test]
async fn test_installed_version_survives_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut config = test_config(&temp_dir.path().join("game"));
    config.state_file = Some(temp_dir.path().join("state.json"));

    let bridge = MockBridge::new(ManifestFixture::with_version("1.2.0"));
    let first = Orchestrator::new(bridge, config.clone()).await?;
    first.check_updates().await?;
    first.install(InstallOptions::blocking()).await?;
    assert!(wait_until(|| first.bridge().verify_calls() == 1).await);

    let second =
        Orchestrator::new(MockBridge::new(ManifestFixture::with_version("1.3.0")), config).await?;
    assert_eq!(second.snapshot().installed_version.as_deref(), Some("1.2.0"));

    second.check_updates().await?;
    assert!(second.snapshot().update_available);
    Ok(())
}

#[tokio::test]
async fn test_shared_store_sees_install_from_other_orchestrator() -> Result<()> {
    let store = Arc::new(DurableStore::in_memory());
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("4.0.0")));
    let config = test_config(Path::new("/games/pack"));

    let first =
        Orchestrator::with_store(Arc::clone(&bridge), config.clone(), Arc::clone(&store)).await?;
    first.check_updates().await?;
    first.install(InstallOptions::voluntary()).await?;

    let second = Orchestrator::with_store(bridge, config, store).await?;
    assert_eq!(second.snapshot().installed_version.as_deref(), Some("4.0.0"));
    Ok(())
}

#[tokio::test]
async fn test_install_before_check_reports_missing_manifest() {
    let bridge = Arc::new(MockBridge::new(ManifestFixture::with_version("1.0.0")));
    let orchestrator = test_orchestrator(&bridge, Path::new("/games/pack")).await;

    let err = orchestrator.install(InstallOptions::blocking()).await.unwrap_err();

    assert_eq!(err, PacksyncError::NoManifest);
    assert!(err.is_precondition());
    assert_eq!(
        orchestrator.snapshot().error.as_deref(),
        Some("No modpack manifest has been fetched yet")
    );
}
