//! Remote service abstraction.

use std::collections::{BTreeMap, HashMap};

use craftsync_protocol::{CreateAck, ProjectRecord, RecordId, Timestamp, UpdateAck};
use parking_lot::Mutex;

use crate::error::{SyncError, SyncResult};
use crate::identity::Identity;

/// The remote side of synchronization.
///
/// This trait abstracts the service the engine pushes to and pulls from,
/// allowing different implementations (HTTP, mock for testing).
/// Implementations are synchronous; the engine drives them from whatever
/// thread runs the sync pass.
pub trait RemoteService: Send + Sync {
    /// Creates a record at the remote.
    ///
    /// The remote may store it under a different id than the local
    /// placeholder; the ack carries the authoritative one.
    fn create(&self, identity: &Identity, record: &ProjectRecord) -> SyncResult<CreateAck>;

    /// Replaces an existing remote record.
    fn update(
        &self,
        identity: &Identity,
        id: &RecordId,
        record: &ProjectRecord,
    ) -> SyncResult<UpdateAck>;

    /// Deletes a remote record.
    fn delete(&self, identity: &Identity, id: &RecordId) -> SyncResult<()>;

    /// Returns every record the remote holds for this identity.
    fn list(&self, identity: &Identity) -> SyncResult<Vec<ProjectRecord>>;
}

/// A call observed by [`MockRemote`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// A create for the given local record id.
    Create(RecordId),
    /// An update for the given record id.
    Update(RecordId),
    /// A delete for the given record id.
    Delete(RecordId),
    /// A list request.
    List,
}

#[derive(Default)]
struct MockState {
    records: BTreeMap<RecordId, ProjectRecord>,
    reassign_ids: bool,
    /// When set, confirmed writes are stamped with this time instead of
    /// the client's timestamp.
    server_time: Option<Timestamp>,
    fail_all: u32,
    fail_lists: u32,
    fail_records: HashMap<RecordId, u32>,
    unauthorized: bool,
    calls: Vec<MockCall>,
}

/// A scriptable in-memory remote for testing.
///
/// Behaves like a small authoritative server: creates can assign fresh
/// ids, an optional server clock stamps confirmed writes, and `list`
/// returns the current server state. Failures are injected per call or
/// per record.
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<MockState>,
}

impl MockRemote {
    /// Creates an empty mock remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the remote assign a fresh id to every create.
    pub fn reassign_ids(&self, on: bool) {
        self.state.lock().reassign_ids = on;
    }

    /// Sets the server clock used to stamp confirmed writes.
    pub fn set_server_time(&self, now: Timestamp) {
        self.state.lock().server_time = Some(now);
    }

    /// Fails the next `n` calls with a retryable transport error.
    pub fn fail_next(&self, n: u32) {
        self.state.lock().fail_all = n;
    }

    /// Fails the next `n` list calls, leaving writes untouched.
    pub fn fail_lists(&self, n: u32) {
        self.state.lock().fail_lists = n;
    }

    /// Fails the next `n` calls that touch `record_id`.
    pub fn fail_record(&self, record_id: RecordId, n: u32) {
        self.state.lock().fail_records.insert(record_id, n);
    }

    /// Rejects every call with an identity error until turned off.
    pub fn set_unauthorized(&self, on: bool) {
        self.state.lock().unauthorized = on;
    }

    /// Seeds a record directly into the server state.
    pub fn seed(&self, record: ProjectRecord) {
        let mut state = self.state.lock();
        state.records.insert(record.id, record);
    }

    /// The server's copy of a record.
    pub fn record(&self, id: &RecordId) -> Option<ProjectRecord> {
        self.state.lock().records.get(id).cloned()
    }

    /// All server records.
    pub fn records(&self) -> Vec<ProjectRecord> {
        self.state.lock().records.values().cloned().collect()
    }

    /// Every call made against this remote, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Number of calls made against this remote.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }
}

/// Records the call, then applies any scripted failure.
fn begin_call(state: &mut MockState, target: Option<RecordId>, call: MockCall) -> SyncResult<()> {
    let is_list = call == MockCall::List;
    state.calls.push(call);
    if state.unauthorized {
        return Err(SyncError::Unauthorized);
    }
    if state.fail_all > 0 {
        state.fail_all -= 1;
        return Err(SyncError::transport_retryable("injected failure"));
    }
    if is_list && state.fail_lists > 0 {
        state.fail_lists -= 1;
        return Err(SyncError::transport_retryable("injected failure"));
    }
    if let Some(id) = target {
        if let Some(n) = state.fail_records.get_mut(&id) {
            if *n > 0 {
                *n -= 1;
                return Err(SyncError::transport_retryable("injected failure"));
            }
        }
    }
    Ok(())
}

impl RemoteService for MockRemote {
    fn create(&self, _identity: &Identity, record: &ProjectRecord) -> SyncResult<CreateAck> {
        let mut state = self.state.lock();
        begin_call(&mut state, Some(record.id), MockCall::Create(record.id))?;
        let id = if state.reassign_ids {
            RecordId::new()
        } else {
            record.id
        };
        let mut stored = record.clone();
        stored.id = id;
        if let Some(t) = state.server_time {
            stored.updated_at = t;
        }
        let updated_at = stored.updated_at;
        state.records.insert(id, stored);
        Ok(CreateAck { id, updated_at })
    }

    fn update(
        &self,
        _identity: &Identity,
        id: &RecordId,
        record: &ProjectRecord,
    ) -> SyncResult<UpdateAck> {
        let mut state = self.state.lock();
        begin_call(&mut state, Some(*id), MockCall::Update(*id))?;
        if !state.records.contains_key(id) {
            return Err(SyncError::NotFound(*id));
        }
        let mut stored = record.clone();
        stored.id = *id;
        if let Some(t) = state.server_time {
            stored.updated_at = t;
        }
        let updated_at = stored.updated_at;
        state.records.insert(*id, stored);
        Ok(UpdateAck { updated_at })
    }

    fn delete(&self, _identity: &Identity, id: &RecordId) -> SyncResult<()> {
        let mut state = self.state.lock();
        begin_call(&mut state, Some(*id), MockCall::Delete(*id))?;
        if state.records.remove(id).is_none() {
            return Err(SyncError::NotFound(*id));
        }
        Ok(())
    }

    fn list(&self, _identity: &Identity) -> SyncResult<Vec<ProjectRecord>> {
        let mut state = self.state.lock();
        begin_call(&mut state, None, MockCall::List)?;
        Ok(state.records.values().cloned().collect())
    }
}
