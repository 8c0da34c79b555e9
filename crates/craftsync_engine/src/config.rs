//! Configuration for the sync engine.

use std::time::Duration;

use craftsync_protocol::ConflictPolicy;

/// Configuration for sync behavior.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Failed push attempts a queue item gets before it is dropped.
    pub max_retries: u32,
    /// Policy for resolving divergent records during pull.
    pub conflict_policy: ConflictPolicy,
    /// Start a drain pass automatically after a local mutation enqueues.
    pub drain_on_enqueue: bool,
    /// Run a full sync when connectivity returns.
    pub sync_on_reconnect: bool,
    /// Advisory interval for host-driven periodic sync.
    ///
    /// The engine does not own a timer. Hosts that want periodic sync read
    /// this value and call [`SyncEngine::full_sync`] on their own schedule.
    ///
    /// [`SyncEngine::full_sync`]: crate::SyncEngine::full_sync
    pub sync_interval: Option<Duration>,
}

impl SyncConfig {
    /// Creates a config with default settings.
    pub fn new() -> Self {
        Self {
            max_retries: 5,
            conflict_policy: ConflictPolicy::Newest,
            drain_on_enqueue: true,
            sync_on_reconnect: true,
            sync_interval: None,
        }
    }

    /// Sets the per-item retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the conflict resolution policy.
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Enables or disables draining the queue right after an enqueue.
    pub fn with_drain_on_enqueue(mut self, drain: bool) -> Self {
        self.drain_on_enqueue = drain;
        self
    }

    /// Enables or disables the automatic full sync on reconnect.
    pub fn with_sync_on_reconnect(mut self, sync: bool) -> Self {
        self.sync_on_reconnect = sync;
        self
    }

    /// Sets the advisory periodic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
