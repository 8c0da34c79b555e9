//! The sync engine state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use craftsync_protocol::{
    Conflict, ConflictPolicy, ConflictWinner, CreateAck, MutationKind, ProjectRecord, QueueItem,
    RecordId, RecordKind, Timestamp,
};
use craftsync_store::ProjectStore;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, EventSubscription, SubscriptionId, SyncEvent};
use crate::identity::{Identity, IdentityProvider};
use crate::monitor::NetworkStatus;
use crate::queue::SyncQueue;
use crate::remote::RemoteService;

/// The engine's lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Connected (as far as we know) and not currently syncing.
    Idle,
    /// A sync pass is running.
    Syncing,
    /// Connectivity is gone; mutations queue locally until it returns.
    Offline,
}

impl EngineStatus {
    /// True if a new sync pass may start from this status.
    pub fn can_start_sync(&self) -> bool {
        matches!(self, EngineStatus::Idle)
    }
}

/// Statistics about sync activity since the engine was created.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Sync passes completed (drain-only and full).
    pub passes_completed: u64,
    /// Queue items confirmed by the remote.
    pub records_pushed: u64,
    /// Remote records imported by pull.
    pub records_imported: u64,
    /// Local records overwritten by a winning remote copy.
    pub records_replaced: u64,
    /// Divergences detected during pull.
    pub conflicts_detected: u64,
    /// Failed push attempts that stayed queued.
    pub retries: u64,
    /// Items dropped after exhausting their retry budget.
    pub permanent_failures: u64,
    /// When the last pass finished.
    pub last_sync_at: Option<Timestamp>,
    /// Last error message, if the last pass had one.
    pub last_error: Option<String>,
}

/// Outcome of a push pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushSummary {
    /// Items confirmed and removed from the queue.
    pub succeeded: u64,
    /// Items dropped after exhausting their retry budget.
    pub failed: u64,
    /// Items that failed but remain queued for a later pass.
    pub deferred: u64,
}

/// Outcome of a pull pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullSummary {
    /// Remote records imported locally.
    pub imported: u64,
    /// Local records overwritten by a winning remote copy.
    pub replaced: u64,
    /// Remote records skipped because a local delete is pending.
    pub skipped_deleted: u64,
    /// Records already at the same version on both sides.
    pub unchanged: u64,
    /// Divergences detected, whichever side won.
    pub conflicts: Vec<Conflict>,
}

/// Outcome of a full sync (push then pull).
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Push outcome. Stands even when the pull aborted.
    pub push: PushSummary,
    /// Pull outcome; `None` when the pull aborted.
    pub pull: Option<PullSummary>,
    /// Error that aborted the pull, if any.
    pub pull_error: Option<String>,
    /// Wall time for the whole pass.
    pub duration: Duration,
}

/// The sync engine: owns the mutation queue, drives push and pull, and
/// publishes status events.
///
/// One instance serves the whole application. Collaborators are injected
/// rather than discovered, so tests can wire mock remotes, manual clocks,
/// and memory stores without touching global state. All methods take
/// `&self`; a pass runs on whichever thread triggered it, and concurrent
/// triggers collapse into one pass.
pub struct SyncEngine<R: RemoteService, I: IdentityProvider> {
    config: SyncConfig,
    store: ProjectStore,
    queue: SyncQueue,
    remote: Arc<R>,
    identity: Arc<I>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    status: RwLock<EngineStatus>,
    conflict_policy: RwLock<ConflictPolicy>,
    online: AtomicBool,
    stats: RwLock<SyncStats>,
}

impl<R: RemoteService, I: IdentityProvider> SyncEngine<R, I> {
    /// Creates an engine over its collaborators.
    ///
    /// The engine starts `Idle` and assumes connectivity until the host
    /// reports otherwise. A wrong assumption costs one failed attempt per
    /// queued item, which the retry budget absorbs.
    pub fn new(
        config: SyncConfig,
        store: ProjectStore,
        queue: SyncQueue,
        remote: Arc<R>,
        identity: Arc<I>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let conflict_policy = RwLock::new(config.conflict_policy);
        Self {
            config,
            store,
            queue,
            remote,
            identity,
            clock,
            events: EventBus::new(),
            status: RwLock::new(EngineStatus::Idle),
            conflict_policy,
            online: AtomicBool::new(true),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Current engine status.
    pub fn status(&self) -> EngineStatus {
        *self.status.read()
    }

    /// Current connectivity as last reported by the host.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// The engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// A snapshot of the activity counters.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// The conflict policy applied by the next pull.
    pub fn conflict_policy(&self) -> ConflictPolicy {
        *self.conflict_policy.read()
    }

    /// Changes the conflict policy. Takes effect on the next pull.
    pub fn set_conflict_policy(&self, policy: ConflictPolicy) {
        *self.conflict_policy.write() = policy;
    }

    /// Pending mutations in push order.
    pub fn pending_mutations(&self) -> Vec<QueueItem> {
        self.queue.peek_all()
    }

    /// Number of pending mutations.
    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> EventSubscription {
        self.events.subscribe()
    }

    /// Cancels an event subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id)
    }

    // ---- Local write path -------------------------------------------------

    /// Creates a record locally and queues it for push.
    ///
    /// Succeeds regardless of connectivity. The returned record carries a
    /// local placeholder id until the remote confirms the create.
    pub fn create_record(&self, kind: RecordKind, payload: Value) -> SyncResult<ProjectRecord> {
        let now = self.clock.now();
        let record = ProjectRecord::new(kind, payload, now);
        self.store.put(&record)?;
        self.queue
            .enqueue(record.id, MutationKind::Create, Some(&record), now)?;
        debug!(record_id = %record.id, kind = %record.kind, "created record");
        self.maybe_drain();
        Ok(record)
    }

    /// Applies a payload edit to an existing record and queues the update.
    pub fn update_record(&self, id: &RecordId, payload: Value) -> SyncResult<ProjectRecord> {
        let now = self.clock.now();
        let mut record = self.store.get(id)?.ok_or(SyncError::UnknownRecord(*id))?;
        record.apply_edit(payload, now);
        self.store.put(&record)?;
        self.queue
            .enqueue(record.id, MutationKind::Update, Some(&record), now)?;
        debug!(record_id = %record.id, "updated record");
        self.maybe_drain();
        Ok(record)
    }

    /// Deletes a record locally and queues the delete.
    pub fn delete_record(&self, id: &RecordId) -> SyncResult<()> {
        let now = self.clock.now();
        if self.store.get(id)?.is_none() {
            return Err(SyncError::UnknownRecord(*id));
        }
        self.store.delete(id)?;
        self.queue.enqueue(*id, MutationKind::Delete, None, now)?;
        debug!(record_id = %id, "deleted record");
        self.maybe_drain();
        Ok(())
    }

    /// Reads a record from the local store. Never touches the network.
    pub fn get_record(&self, id: &RecordId) -> SyncResult<Option<ProjectRecord>> {
        Ok(self.store.get(id)?)
    }

    /// Lists local records, optionally filtered by kind. Never touches the
    /// network.
    pub fn list_records(&self, filter: Option<RecordKind>) -> SyncResult<Vec<ProjectRecord>> {
        Ok(self.store.list(filter)?)
    }

    // ---- Connectivity -----------------------------------------------------

    /// Feeds a connectivity transition from the host's network monitor.
    ///
    /// Going offline parks the engine. Going online re-arms it and, with
    /// `sync_on_reconnect` set, starts a full sync immediately.
    pub fn handle_network_change(&self, status: NetworkStatus) {
        match status {
            NetworkStatus::Offline => {
                let was_online = self.online.swap(false, Ordering::SeqCst);
                if was_online {
                    *self.status.write() = EngineStatus::Offline;
                    info!("network offline; queueing mutations locally");
                    self.events.emit(SyncEvent::Offline);
                }
            }
            NetworkStatus::Online => {
                let was_online = self.online.swap(true, Ordering::SeqCst);
                if !was_online {
                    {
                        let mut status = self.status.write();
                        if *status == EngineStatus::Offline {
                            *status = EngineStatus::Idle;
                        }
                    }
                    info!("network online");
                    self.events.emit(SyncEvent::Online);
                    if self.config.sync_on_reconnect {
                        if let Err(e) = self.full_sync() {
                            warn!(error = %e, "reconnect sync failed");
                        }
                    }
                }
            }
        }
    }

    // ---- Sync passes ------------------------------------------------------

    /// Pushes the pending queue, oldest first.
    ///
    /// Returns `None` when a pass is already running or the engine is
    /// offline; triggers are cheap to fire and safe to repeat. Items
    /// enqueued while a pass runs wait for the next trigger.
    pub fn trigger_drain(&self) -> SyncResult<Option<PushSummary>> {
        if !self.try_begin_pass() {
            return Ok(None);
        }
        let Some(identity) = self.identity.resolve() else {
            self.finish_pass();
            return Err(SyncError::MissingIdentity);
        };
        self.events.emit(SyncEvent::SyncStarted);
        let result = self.run_push(&identity);
        self.finish_pass();
        match result {
            Ok(summary) => {
                self.events.emit(SyncEvent::SyncCompleted {
                    succeeded: summary.succeeded,
                    failed: summary.failed,
                });
                self.note_pass(Some(&summary), None, None);
                info!(
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    deferred = summary.deferred,
                    "drain pass complete"
                );
                Ok(Some(summary))
            }
            Err(e) => {
                self.stats.write().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Pulls the remote record list and merges it into the local store.
    ///
    /// Returns `None` when a pass is already running or the engine is
    /// offline. Never deletes a local record the remote list lacks, and a
    /// repeat pull with no intervening changes writes nothing.
    pub fn pull_now(&self) -> SyncResult<Option<PullSummary>> {
        if !self.try_begin_pass() {
            return Ok(None);
        }
        let Some(identity) = self.identity.resolve() else {
            self.finish_pass();
            return Err(SyncError::MissingIdentity);
        };
        let result = self.run_pull(&identity);
        self.finish_pass();
        match result {
            Ok(summary) => {
                self.note_pass(None, Some(&summary), None);
                debug!(
                    imported = summary.imported,
                    replaced = summary.replaced,
                    conflicts = summary.conflicts.len(),
                    "pull complete"
                );
                Ok(Some(summary))
            }
            Err(e) => {
                self.stats.write().last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Runs a full pass: push the queue, then pull the remote list.
    ///
    /// Returns `None` when a pass is already running or the engine is
    /// offline. A pull failure is reported inside the report; push results
    /// stand regardless and are never rolled back.
    pub fn full_sync(&self) -> SyncResult<Option<SyncReport>> {
        if !self.try_begin_pass() {
            return Ok(None);
        }
        let Some(identity) = self.identity.resolve() else {
            self.finish_pass();
            return Err(SyncError::MissingIdentity);
        };
        let start = Instant::now();
        self.events.emit(SyncEvent::SyncStarted);

        let push = match self.run_push(&identity) {
            Ok(push) => push,
            Err(e) => {
                self.finish_pass();
                self.stats.write().last_error = Some(e.to_string());
                return Err(e);
            }
        };
        let (pull, pull_error) = match self.run_pull(&identity) {
            Ok(summary) => (Some(summary), None),
            Err(e) => {
                warn!(error = %e, "pull aborted; push results stand");
                (None, Some(e.to_string()))
            }
        };
        self.finish_pass();
        self.events.emit(SyncEvent::SyncCompleted {
            succeeded: push.succeeded,
            failed: push.failed,
        });
        self.note_pass(Some(&push), pull.as_ref(), pull_error.clone());
        let report = SyncReport {
            push,
            pull,
            pull_error,
            duration: start.elapsed(),
        };
        info!(
            pushed = report.push.succeeded,
            failed = report.push.failed,
            imported = report.pull.as_ref().map_or(0, |p| p.imported),
            "full sync complete"
        );
        Ok(Some(report))
    }

    // ---- Pass internals ---------------------------------------------------

    /// Claims the `Syncing` slot. Only one pass runs at a time.
    fn try_begin_pass(&self) -> bool {
        if !self.is_online() {
            return false;
        }
        let mut status = self.status.write();
        if *status == EngineStatus::Idle {
            *status = EngineStatus::Syncing;
            true
        } else {
            false
        }
    }

    fn finish_pass(&self) {
        let mut status = self.status.write();
        if *status == EngineStatus::Syncing {
            *status = if self.is_online() {
                EngineStatus::Idle
            } else {
                EngineStatus::Offline
            };
        }
    }

    fn maybe_drain(&self) {
        if !self.config.drain_on_enqueue {
            return;
        }
        // Failure here never invalidates the local mutation; the queue
        // holds it for a later pass.
        if let Err(e) = self.trigger_drain() {
            debug!(error = %e, "deferred drain after enqueue");
        }
    }

    fn run_push(&self, identity: &Identity) -> SyncResult<PushSummary> {
        let items = self.queue.peek_all();
        let mut summary = PushSummary::default();
        for item in items {
            if !self.is_online() {
                debug!("went offline mid-pass; deferring remaining items");
                break;
            }
            match self.push_item(identity, &item) {
                Ok(()) => summary.succeeded += 1,
                // Local persistence failures abort the pass; everything
                // still queued is untouched.
                Err(e @ SyncError::Store(_)) => return Err(e),
                Err(e) => {
                    warn!(record_id = %item.record_id, error = %e, "push attempt failed");
                    if matches!(e, SyncError::Unauthorized) {
                        self.identity.invalidate();
                    }
                    let retries = self.queue.increment_retry(item.id)?;
                    self.stats.write().retries += 1;
                    if retries >= self.config.max_retries {
                        self.queue.remove(item.id)?;
                        summary.failed += 1;
                        warn!(
                            record_id = %item.record_id,
                            retries,
                            "dropping mutation after exhausting retries"
                        );
                    } else {
                        summary.deferred += 1;
                    }
                }
            }
        }
        Ok(summary)
    }

    /// Pushes one queue item. An `Ok` return means the item was confirmed
    /// and removed from the queue.
    fn push_item(&self, identity: &Identity, item: &QueueItem) -> SyncResult<()> {
        match item.kind {
            MutationKind::Create => {
                let snapshot = item
                    .snapshot
                    .as_ref()
                    .ok_or_else(|| SyncError::protocol("create item without snapshot"))?;
                let ack = self.remote.create(identity, snapshot)?;
                self.queue.remove(item.id)?;
                self.confirm_create(item, snapshot, ack)?;
            }
            MutationKind::Update => {
                let snapshot = item
                    .snapshot
                    .as_ref()
                    .ok_or_else(|| SyncError::protocol("update item without snapshot"))?;
                let ack = self.remote.update(identity, &item.record_id, snapshot)?;
                self.queue.remove(item.id)?;
                self.adopt_ack_timestamp(&item.record_id, snapshot, ack.updated_at)?;
            }
            MutationKind::Delete => {
                match self.remote.delete(identity, &item.record_id) {
                    Ok(()) => {}
                    // The remote never knew the record; its state already
                    // matches the intent.
                    Err(SyncError::NotFound(_)) => {
                        trace!(record_id = %item.record_id, "delete target already absent at remote");
                    }
                    Err(e) => return Err(e),
                }
                self.queue.remove(item.id)?;
            }
        }
        Ok(())
    }

    /// After a confirmed create: adopt the remote identity and timestamp.
    fn confirm_create(
        &self,
        item: &QueueItem,
        snapshot: &ProjectRecord,
        ack: CreateAck,
    ) -> SyncResult<()> {
        let old_id = item.record_id;
        if ack.id == old_id {
            return self.adopt_ack_timestamp(&old_id, snapshot, ack.updated_at);
        }
        info!(old_id = %old_id, new_id = %ack.id, "remote assigned a new record id");
        if let Some(mut record) = self.store.get(&old_id)? {
            self.store.delete(&old_id)?;
            record.id = ack.id;
            if record.updated_at == snapshot.updated_at {
                record.updated_at = ack.updated_at;
            }
            self.store.put(&record)?;
        }
        // Anything queued behind the create (an edit made while this pass
        // ran) must target the confirmed id.
        let rewritten = self.queue.rewrite_record_id(&old_id, ack.id)?;
        if rewritten > 0 {
            debug!(count = rewritten, "rewrote pending mutations to the confirmed id");
        }
        Ok(())
    }

    /// Copies the remote's confirmed timestamp onto the local record, but
    /// only if the record is unchanged since the pushed snapshot. A newer
    /// local edit keeps its own timestamp for conflict resolution.
    fn adopt_ack_timestamp(
        &self,
        id: &RecordId,
        snapshot: &ProjectRecord,
        confirmed: Timestamp,
    ) -> SyncResult<()> {
        if let Some(mut record) = self.store.get(id)? {
            if record.updated_at == snapshot.updated_at && record.updated_at != confirmed {
                record.updated_at = confirmed;
                self.store.put(&record)?;
            }
        }
        Ok(())
    }

    fn run_pull(&self, identity: &Identity) -> SyncResult<PullSummary> {
        let remote_records = self.remote.list(identity)?;
        debug!(count = remote_records.len(), "pulled remote record list");
        let policy = self.conflict_policy();
        let mut summary = PullSummary::default();
        for remote in remote_records {
            // A pending local delete wins; importing the remote copy would
            // resurrect the record.
            let pending_delete = self
                .queue
                .pending_for(&remote.id)
                .is_some_and(|item| item.kind == MutationKind::Delete);
            if pending_delete {
                trace!(record_id = %remote.id, "skipping remote copy with pending local delete");
                summary.skipped_deleted += 1;
                continue;
            }
            match self.store.get(&remote.id)? {
                None => {
                    self.store.put(&remote)?;
                    summary.imported += 1;
                }
                Some(local) => {
                    if local.same_version(&remote) {
                        summary.unchanged += 1;
                        continue;
                    }
                    let winner = policy.resolve(&local, &remote);
                    let conflict = Conflict::new(&local, &remote, winner);
                    warn!(
                        record_id = %local.id,
                        local_updated_at = %conflict.local_updated_at,
                        remote_updated_at = %conflict.remote_updated_at,
                        winner = ?winner,
                        "conflict detected"
                    );
                    self.events.emit(SyncEvent::ConflictDetected {
                        record_id: local.id,
                    });
                    if winner == ConflictWinner::Remote {
                        self.store.put(&remote)?;
                        summary.replaced += 1;
                    }
                    summary.conflicts.push(conflict);
                }
            }
        }
        Ok(summary)
    }

    fn note_pass(
        &self,
        push: Option<&PushSummary>,
        pull: Option<&PullSummary>,
        last_error: Option<String>,
    ) {
        let mut stats = self.stats.write();
        stats.passes_completed += 1;
        if let Some(push) = push {
            stats.records_pushed += push.succeeded;
            stats.permanent_failures += push.failed;
        }
        if let Some(pull) = pull {
            stats.records_imported += pull.imported;
            stats.records_replaced += pull.replaced;
            stats.conflicts_detected += pull.conflicts.len() as u64;
        }
        stats.last_sync_at = Some(self.clock.now());
        stats.last_error = last_error;
    }
}
