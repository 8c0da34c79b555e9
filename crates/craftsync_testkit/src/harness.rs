//! End-to-end sync test helpers.
//!
//! Wires a [`SyncEngine`] to a scriptable remote and a manual clock so
//! whole sync passes run hermetically and deterministically.

use std::sync::Arc;

use craftsync_engine::{
    Clock, Identity, ManualClock, MockRemote, PushSummary, StaticIdentity, SyncConfig, SyncEngine,
    SyncQueue,
};
use craftsync_protocol::{ProjectRecord, RecordKind, Timestamp};
use craftsync_store::{MemoryBackend, ProjectStore, StorageBackend};
use serde_json::Value;

/// Epoch for harness clocks. Tests advance from here.
const HARNESS_EPOCH_MS: u64 = 1_000;

/// A fully wired engine over in-memory storage and a scriptable remote.
pub struct SyncHarness {
    /// The engine under test.
    pub engine: SyncEngine<MockRemote, StaticIdentity>,
    /// The remote, kept for scripting failures and inspecting calls.
    pub remote: Arc<MockRemote>,
    /// The clock, kept for advancing time mid-test.
    pub clock: Arc<ManualClock>,
    /// The backend, kept for reopening stores across simulated restarts.
    pub backend: Arc<dyn StorageBackend>,
}

impl SyncHarness {
    /// Creates a harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SyncConfig::new())
    }

    /// Creates a harness with an explicit configuration.
    pub fn with_config(config: SyncConfig) -> Self {
        Self::sharing(
            config,
            Arc::new(MockRemote::new()),
            Arc::new(ManualClock::new(Timestamp::from_millis(HARNESS_EPOCH_MS))),
        )
    }

    /// Creates a harness over an existing remote and clock.
    ///
    /// Use this to wire several engines to one remote for multi-device
    /// convergence tests.
    pub fn sharing(config: SyncConfig, remote: Arc<MockRemote>, clock: Arc<ManualClock>) -> Self {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let store = ProjectStore::new(Arc::clone(&backend));
        let queue = SyncQueue::open(Arc::clone(&backend)).expect("Failed to open queue");
        let identity = Arc::new(StaticIdentity::new(Identity::new("studio", "token")));
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let engine = SyncEngine::new(
            config,
            store,
            queue,
            Arc::clone(&remote),
            identity,
            clock_dyn,
        );
        Self {
            engine,
            remote,
            clock,
            backend,
        }
    }

    /// Advances the clock by `millis`.
    pub fn tick(&self, millis: u64) {
        self.clock.advance(millis);
    }

    /// Creates a project record through the engine.
    pub fn create_project(&self, payload: Value) -> ProjectRecord {
        self.engine
            .create_record(RecordKind::Project, payload)
            .expect("Failed to create record")
    }

    /// Runs a drain pass and asserts every queued item was confirmed.
    pub fn drain_clean(&self) -> PushSummary {
        let summary = self
            .engine
            .trigger_drain()
            .expect("Drain pass failed")
            .expect("Drain pass was suppressed");
        assert_eq!(summary.failed, 0, "items exhausted their retry budget");
        assert_eq!(summary.deferred, 0, "items stayed queued after the pass");
        summary
    }

    /// Asserts local and remote hold the same records at the same versions.
    pub fn assert_converged(&self) {
        let mut local = self
            .engine
            .list_records(None)
            .expect("Failed to list local records");
        let mut remote = self.remote.records();
        local.sort_by_key(|r| r.id);
        remote.sort_by_key(|r| r.id);

        let local_versions: Vec<_> = local.iter().map(|r| (r.id, r.updated_at)).collect();
        let remote_versions: Vec<_> = remote.iter().map(|r| (r.id, r.updated_at)).collect();
        assert_eq!(
            local_versions, remote_versions,
            "local and remote diverged"
        );
    }
}

impl Default for SyncHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Two engines sharing one remote and clock, for convergence tests.
pub struct SyncPair {
    /// First device.
    pub a: SyncHarness,
    /// Second device.
    pub b: SyncHarness,
}

impl SyncPair {
    /// Creates a pair with the default configuration on both devices.
    pub fn new() -> Self {
        Self::with_config(SyncConfig::new())
    }

    /// Creates a pair with the same explicit configuration on both devices.
    pub fn with_config(config: SyncConfig) -> Self {
        let remote = Arc::new(MockRemote::new());
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(HARNESS_EPOCH_MS)));
        let a = SyncHarness::sharing(config.clone(), Arc::clone(&remote), Arc::clone(&clock));
        let b = SyncHarness::sharing(config, remote, clock);
        Self { a, b }
    }
}

impl Default for SyncPair {
    fn default() -> Self {
        Self::new()
    }
}
