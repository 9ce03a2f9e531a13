//! Scriptable in-memory [`CommandBridge`] for tests.
//!
//! Every backend operation returns a configurable result after a configurable
//! delay and counts its invocations. Install and repair emit the scripted
//! progress events on the bridge's broadcast channel before settling, and the
//! bridge records how many install/repair calls were running at once so tests
//! can assert they never overlapped.

use crate::bridge::{CommandBridge, ProgressEvent, ServerStatus};
use crate::constants::PROGRESS_CHANNEL_CAPACITY;
use crate::core::BridgeError;
use crate::manifest::Manifest;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

/// Invocation counters, one per backend operation.
#[derive(Debug, Default)]
pub struct CallCounts {
    /// Manifest fetches, including scripted failures
    pub fetch_manifest: AtomicUsize,
    /// Reads of the version on disk
    pub get_installed_version: AtomicUsize,
    /// Installs started
    pub install: AtomicUsize,
    /// Verify/repair passes started, silent or manual
    pub verify_and_repair: AtomicUsize,
    /// Content-change checks
    pub manifest_changed: AtomicUsize,
    /// Server pings
    pub ping_server: AtomicUsize,
}

impl CallCounts {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Per-operation artificial latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delays {
    /// Before a manifest fetch settles
    pub fetch: Duration,
    /// After an install's progress events, before it settles
    pub install: Duration,
    /// After a repair's progress events, before it settles
    pub verify: Duration,
    /// Before a server ping settles
    pub ping: Duration,
}

#[derive(Debug)]
struct Script {
    manifest: Result<Manifest, BridgeError>,
    /// Failures returned by the next fetches before `manifest` is served
    fetch_failures: VecDeque<BridgeError>,
    installed_on_disk: Result<Option<String>, BridgeError>,
    install: Result<String, BridgeError>,
    /// Results for the next repairs; falls back to success when empty
    verify: VecDeque<Result<String, BridgeError>>,
    manifest_changed: Result<bool, BridgeError>,
    server: Result<ServerStatus, BridgeError>,
    progress: Vec<ProgressEvent>,
    delays: Delays,
}

/// Backend double driven entirely from test code.
#[derive(Debug)]
pub struct MockBridge {
    script: Mutex<Script>,
    progress: broadcast::Sender<ProgressEvent>,
    calls: CallCounts,
    active_writers: AtomicUsize,
    max_active_writers: AtomicUsize,
}

impl MockBridge {
    /// Bridge serving `manifest`, with nothing installed on disk.
    pub fn new(manifest: Manifest) -> Self {
        Self::with_fetch_result(Ok(manifest))
    }

    /// Bridge whose manifest fetches always fail with `message`.
    pub fn unreachable(message: &str) -> Self {
        Self::with_fetch_result(Err(BridgeError::new(message)))
    }

    fn with_fetch_result(manifest: Result<Manifest, BridgeError>) -> Self {
        let (progress, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            script: Mutex::new(Script {
                manifest,
                fetch_failures: VecDeque::new(),
                installed_on_disk: Ok(None),
                install: Ok("Modpack installed successfully".to_string()),
                verify: VecDeque::new(),
                manifest_changed: Ok(false),
                server: Ok(ServerStatus::offline()),
                progress: Vec::new(),
                delays: Delays::default(),
            }),
            progress,
            calls: CallCounts::default(),
            active_writers: AtomicUsize::new(0),
            max_active_writers: AtomicUsize::new(0),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Serve `manifest` from now on.
    pub fn set_manifest(&self, manifest: Manifest) {
        self.script().manifest = Ok(manifest);
    }

    /// Fail every fetch from now on.
    pub fn set_fetch_error(&self, message: &str) {
        self.script().manifest = Err(BridgeError::new(message));
    }

    /// Fail the next `count` fetches, then serve the manifest again.
    pub fn fail_next_fetches(&self, count: usize, message: &str) {
        let mut script = self.script();
        script.fetch_failures.extend((0..count).map(|_| BridgeError::new(message)));
    }

    /// Version the backend reports as present on disk.
    pub fn set_installed_on_disk(&self, version: Option<&str>) {
        self.script().installed_on_disk = Ok(version.map(str::to_string));
    }

    /// Make reading the installed version fail.
    pub fn set_installed_on_disk_error(&self, message: &str) {
        self.script().installed_on_disk = Err(BridgeError::new(message));
    }

    /// Make installs fail with `message`.
    pub fn set_install_error(&self, message: &str) {
        self.script().install = Err(BridgeError::new(message));
    }

    /// Make installs succeed again.
    pub fn set_install_ok(&self) {
        self.script().install = Ok("Modpack installed successfully".to_string());
    }

    /// Queue a failure for the next repair.
    pub fn queue_verify_error(&self, message: &str) {
        self.script().verify.push_back(Err(BridgeError::new(message)));
    }

    /// Answer for content-change checks.
    pub fn set_manifest_changed(&self, changed: bool) {
        self.script().manifest_changed = Ok(changed);
    }

    /// Make content-change checks fail.
    pub fn set_manifest_changed_error(&self, message: &str) {
        self.script().manifest_changed = Err(BridgeError::new(message));
    }

    /// Answer for server pings.
    pub fn set_server_status(&self, status: ServerStatus) {
        self.script().server = Ok(status);
    }

    /// Make server pings fail.
    pub fn set_server_error(&self, message: &str) {
        self.script().server = Err(BridgeError::new(message));
    }

    /// Events emitted by every install and repair, in order.
    pub fn set_progress_script(&self, events: Vec<ProgressEvent>) {
        self.script().progress = events;
    }

    /// Artificial latency per operation.
    pub fn set_delays(&self, delays: Delays) {
        self.script().delays = delays;
    }

    /// Invocation counters.
    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    /// Shorthand for `calls().fetch_manifest`.
    pub fn fetch_calls(&self) -> usize {
        self.calls.fetch_manifest.load(Ordering::SeqCst)
    }

    /// Shorthand for `calls().install`.
    pub fn install_calls(&self) -> usize {
        self.calls.install.load(Ordering::SeqCst)
    }

    /// Shorthand for `calls().verify_and_repair`.
    pub fn verify_calls(&self) -> usize {
        self.calls.verify_and_repair.load(Ordering::SeqCst)
    }

    /// Shorthand for `calls().manifest_changed`.
    pub fn manifest_changed_calls(&self) -> usize {
        self.calls.manifest_changed.load(Ordering::SeqCst)
    }

    /// Shorthand for `calls().ping_server`.
    pub fn ping_calls(&self) -> usize {
        self.calls.ping_server.load(Ordering::SeqCst)
    }

    /// Live progress subscriptions.
    pub fn progress_subscribers(&self) -> usize {
        self.progress.receiver_count()
    }

    /// Highest number of install/repair calls observed running at once.
    pub fn max_concurrent_writers(&self) -> usize {
        self.max_active_writers.load(Ordering::SeqCst)
    }

    /// Emit one progress event as the backend would.
    pub fn emit_progress(&self, event: ProgressEvent) {
        let _ = self.progress.send(event);
    }

    async fn write_files<T>(
        &self,
        delay: Duration,
        result: Result<T, BridgeError>,
    ) -> Result<T, BridgeError> {
        let now = self.active_writers.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_writers.fetch_max(now, Ordering::SeqCst);

        let events = self.script().progress.clone();
        for event in events {
            self.emit_progress(event);
            tokio::task::yield_now().await;
        }
        sleep(delay).await;

        self.active_writers.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl CommandBridge for MockBridge {
    async fn fetch_manifest(&self, _url: &str) -> Result<Manifest, BridgeError> {
        CallCounts::bump(&self.calls.fetch_manifest);
        let (delay, result) = {
            let mut script = self.script();
            let result = match script.fetch_failures.pop_front() {
                Some(err) => Err(err),
                None => script.manifest.clone(),
            };
            (script.delays.fetch, result)
        };
        sleep(delay).await;
        result
    }

    async fn get_installed_version(&self, _dir: &Path) -> Result<Option<String>, BridgeError> {
        CallCounts::bump(&self.calls.get_installed_version);
        self.script().installed_on_disk.clone()
    }

    async fn install(&self, _manifest: &Manifest, _dir: &Path) -> Result<String, BridgeError> {
        CallCounts::bump(&self.calls.install);
        let (delay, result) = {
            let script = self.script();
            (script.delays.install, script.install.clone())
        };
        self.write_files(delay, result).await
    }

    async fn verify_and_repair(
        &self,
        _manifest: &Manifest,
        _dir: &Path,
    ) -> Result<String, BridgeError> {
        CallCounts::bump(&self.calls.verify_and_repair);
        let (delay, result) = {
            let mut script = self.script();
            let result = script.verify.pop_front().unwrap_or_else(|| Ok("Verified".to_string()));
            (script.delays.verify, result)
        };
        self.write_files(delay, result).await
    }

    async fn manifest_changed(
        &self,
        _manifest: &Manifest,
        _dir: &Path,
    ) -> Result<bool, BridgeError> {
        CallCounts::bump(&self.calls.manifest_changed);
        self.script().manifest_changed.clone()
    }

    async fn ping_server(&self, _address: &str) -> Result<ServerStatus, BridgeError> {
        CallCounts::bump(&self.calls.ping_server);
        let (delay, result) = {
            let script = self.script();
            (script.delays.ping, script.server.clone())
        };
        sleep(delay).await;
        result
    }

    fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress.subscribe()
    }
}
