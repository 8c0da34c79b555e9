//! Integration tests: engines against an in-process HTTP server and
//! multi-device scenarios over a shared remote.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use craftsync_engine::{
    Clock, HttpClient, HttpMethod, HttpRemote, HttpResponse, Identity, IdentityProvider,
    ManualClock, MemoizedIdentity, MockRemote, RemoteService, StaticIdentity, SyncConfig,
    SyncEngine, SyncQueue,
};
use craftsync_protocol::{ConflictWinner, ProjectRecord, RecordId, RecordKind, Timestamp};
use craftsync_store::{FileBackend, MemoryBackend, ProjectStore, StorageBackend};
use parking_lot::Mutex;
use serde_json::json;

const BASE_URL: &str = "http://sync.test";

/// A minimal projects API served in-process behind the HTTP client trait.
struct InProcessServer {
    records: Mutex<BTreeMap<RecordId, ProjectRecord>>,
    token: String,
}

impl InProcessServer {
    fn new(token: &str) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            token: token.to_string(),
        }
    }

    fn record_count(&self) -> usize {
        self.records.lock().len()
    }
}

impl HttpClient for InProcessServer {
    fn request(
        &self,
        method: HttpMethod,
        url: &str,
        bearer: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, String> {
        if bearer != self.token {
            return Ok(HttpResponse {
                status: 401,
                body: Vec::new(),
            });
        }
        let path = url.strip_prefix(BASE_URL).ok_or("unexpected host")?;
        let mut records = self.records.lock();
        match (method, path) {
            (HttpMethod::Post, "/projects") => {
                let mut record: ProjectRecord =
                    serde_json::from_slice(&body.ok_or("missing body")?)
                        .map_err(|e| e.to_string())?;
                // The server owns record identity.
                record.id = RecordId::new();
                let ack = json!({ "id": record.id, "updated_at": record.updated_at });
                records.insert(record.id, record);
                Ok(HttpResponse {
                    status: 201,
                    body: serde_json::to_vec(&ack).unwrap(),
                })
            }
            (HttpMethod::Get, "/projects") => {
                let all: Vec<&ProjectRecord> = records.values().collect();
                Ok(HttpResponse {
                    status: 200,
                    body: serde_json::to_vec(&all).unwrap(),
                })
            }
            (method, path) => {
                let Some(id) = path.strip_prefix("/projects/").and_then(RecordId::parse) else {
                    return Ok(HttpResponse {
                        status: 404,
                        body: Vec::new(),
                    });
                };
                match method {
                    HttpMethod::Put => {
                        if !records.contains_key(&id) {
                            return Ok(HttpResponse {
                                status: 404,
                                body: Vec::new(),
                            });
                        }
                        let mut record: ProjectRecord =
                            serde_json::from_slice(&body.ok_or("missing body")?)
                                .map_err(|e| e.to_string())?;
                        record.id = id;
                        let ack = json!({ "updated_at": record.updated_at });
                        records.insert(id, record);
                        Ok(HttpResponse {
                            status: 200,
                            body: serde_json::to_vec(&ack).unwrap(),
                        })
                    }
                    HttpMethod::Delete => {
                        let status = if records.remove(&id).is_some() { 204 } else { 404 };
                        Ok(HttpResponse {
                            status,
                            body: Vec::new(),
                        })
                    }
                    _ => Ok(HttpResponse {
                        status: 405,
                        body: Vec::new(),
                    }),
                }
            }
        }
    }
}

/// Shared handle to the server; the orphan rule bars implementing the
/// foreign `HttpClient` trait for `Arc<InProcessServer>` directly.
struct SharedServer(Arc<InProcessServer>);

impl HttpClient for SharedServer {
    fn request(
        &self,
        method: HttpMethod,
        url: &str,
        bearer: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse, String> {
        self.0.request(method, url, bearer, body)
    }
}

/// Builds a manually-driven engine over the given backend and remote.
fn engine_with<R, I>(
    backend: Arc<dyn StorageBackend>,
    remote: Arc<R>,
    identity: Arc<I>,
    clock: Arc<ManualClock>,
) -> SyncEngine<R, I>
where
    R: RemoteService,
    I: IdentityProvider,
{
    let store = ProjectStore::new(Arc::clone(&backend));
    let queue = SyncQueue::open(backend).unwrap();
    let clock_dyn: Arc<dyn Clock> = clock;
    SyncEngine::new(
        SyncConfig::new()
            .with_drain_on_enqueue(false)
            .with_sync_on_reconnect(false),
        store,
        queue,
        remote,
        identity,
        clock_dyn,
    )
}

fn static_identity(token: &str) -> Arc<StaticIdentity> {
    Arc::new(StaticIdentity::new(Identity::new("studio", token)))
}

#[test]
fn end_to_end_create_over_http() {
    let server = Arc::new(InProcessServer::new("token"));
    let remote = Arc::new(HttpRemote::new(BASE_URL, SharedServer(Arc::clone(&server))));
    let engine = engine_with(
        Arc::new(MemoryBackend::new()),
        remote,
        static_identity("token"),
        Arc::new(ManualClock::new(Timestamp::from_millis(1_000))),
    );

    let record = engine
        .create_record(RecordKind::Project, json!({ "name": "Poster", "width": 800 }))
        .unwrap();
    let summary = engine.trigger_drain().unwrap().unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(server.record_count(), 1);

    // The server assigned the id; the local copy follows it.
    assert!(engine.get_record(&record.id).unwrap().is_none());
    let listed = engine.list_records(None).unwrap();
    assert_eq!(listed.len(), 1);
    assert_ne!(listed[0].id, record.id);
    assert_eq!(listed[0].payload, record.payload);

    // A pull straight after changes nothing.
    let pull = engine.pull_now().unwrap().unwrap();
    assert_eq!(pull.imported, 0);
    assert_eq!(pull.unchanged, 1);
}

#[test]
fn update_and_delete_over_http() {
    let server = Arc::new(InProcessServer::new("token"));
    let remote = Arc::new(HttpRemote::new(BASE_URL, SharedServer(Arc::clone(&server))));
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
    let engine = engine_with(
        Arc::new(MemoryBackend::new()),
        remote,
        static_identity("token"),
        Arc::clone(&clock),
    );

    engine
        .create_record(RecordKind::Project, json!({ "name": "v1" }))
        .unwrap();
    engine.trigger_drain().unwrap().unwrap();
    let confirmed = engine.list_records(None).unwrap().remove(0);

    clock.advance(500);
    engine
        .update_record(&confirmed.id, json!({ "name": "v2" }))
        .unwrap();
    let summary = engine.trigger_drain().unwrap().unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(
        server.records.lock().get(&confirmed.id).unwrap().payload,
        json!({ "name": "v2" })
    );

    clock.advance(500);
    engine.delete_record(&confirmed.id).unwrap();
    let summary = engine.trigger_drain().unwrap().unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(server.record_count(), 0);
    assert!(engine.list_records(None).unwrap().is_empty());
}

#[test]
fn stale_token_recovers_through_invalidation() {
    let server = Arc::new(InProcessServer::new("fresh"));
    let remote = Arc::new(HttpRemote::new(BASE_URL, SharedServer(Arc::clone(&server))));

    // The first session lookup answers a revoked token; after the engine
    // invalidates, the next lookup answers the current one.
    let lookups = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&lookups);
    let identity = Arc::new(MemoizedIdentity::new(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let token = if n == 0 { "stale" } else { "fresh" };
        Some(Identity::new("studio", token))
    }));

    let engine = engine_with(
        Arc::new(MemoryBackend::new()),
        remote,
        identity,
        Arc::new(ManualClock::new(Timestamp::from_millis(1_000))),
    );
    engine
        .create_record(RecordKind::Project, json!({ "name": "guarded" }))
        .unwrap();

    let summary = engine.trigger_drain().unwrap().unwrap();
    assert_eq!(summary.deferred, 1);
    assert_eq!(server.record_count(), 0);

    let summary = engine.trigger_drain().unwrap().unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(server.record_count(), 1);
    assert_eq!(lookups.load(Ordering::SeqCst), 2);
}

#[test]
fn two_devices_converge_through_shared_remote() {
    let remote = Arc::new(MockRemote::new());

    let clock_a = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
    let device_a = engine_with(
        Arc::new(MemoryBackend::new()),
        Arc::clone(&remote),
        static_identity("token"),
        Arc::clone(&clock_a),
    );
    let clock_b = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
    let device_b = engine_with(
        Arc::new(MemoryBackend::new()),
        Arc::clone(&remote),
        static_identity("token"),
        Arc::clone(&clock_b),
    );

    // Device A authors a project and pushes it.
    let record = device_a
        .create_record(RecordKind::Project, json!({ "name": "shared" }))
        .unwrap();
    device_a.trigger_drain().unwrap().unwrap();

    // Device B pulls it in.
    let pull = device_b.pull_now().unwrap().unwrap();
    assert_eq!(pull.imported, 1);
    assert_eq!(
        device_b.get_record(&record.id).unwrap().unwrap().payload,
        json!({ "name": "shared" })
    );

    // Device B edits later and pushes.
    clock_b.set(Timestamp::from_millis(50_000));
    device_b
        .update_record(&record.id, json!({ "name": "edited on B" }))
        .unwrap();
    device_b.trigger_drain().unwrap().unwrap();

    // Device A pulls; the newer remote copy wins.
    let pull = device_a.pull_now().unwrap().unwrap();
    assert_eq!(pull.replaced, 1);
    assert_eq!(pull.conflicts.len(), 1);
    assert_eq!(pull.conflicts[0].winner, ConflictWinner::Remote);
    assert_eq!(
        device_a.get_record(&record.id).unwrap().unwrap().payload,
        json!({ "name": "edited on B" })
    );
}

#[test]
fn deletes_do_not_propagate_to_other_devices() {
    let remote = Arc::new(MockRemote::new());
    let device_a = engine_with(
        Arc::new(MemoryBackend::new()),
        Arc::clone(&remote),
        static_identity("token"),
        Arc::new(ManualClock::new(Timestamp::from_millis(1_000))),
    );
    let device_b = engine_with(
        Arc::new(MemoryBackend::new()),
        Arc::clone(&remote),
        static_identity("token"),
        Arc::new(ManualClock::new(Timestamp::from_millis(2_000))),
    );

    let record = device_a
        .create_record(RecordKind::Project, json!({ "name": "ephemeral" }))
        .unwrap();
    device_a.trigger_drain().unwrap().unwrap();
    device_b.pull_now().unwrap().unwrap();
    assert_eq!(device_b.list_records(None).unwrap().len(), 1);

    // A deletes; the remote copy goes away.
    device_a.delete_record(&record.id).unwrap();
    device_a.trigger_drain().unwrap().unwrap();
    assert!(remote.records().is_empty());

    // B's next sync leaves its local copy alone: absence from the remote
    // list is never treated as a deletion.
    let report = device_b.full_sync().unwrap().unwrap();
    assert_eq!(report.pull.unwrap().imported, 0);
    assert_eq!(device_b.list_records(None).unwrap().len(), 1);
}

#[test]
fn offline_work_survives_restart_and_drains() {
    let dir = tempfile::tempdir().unwrap();
    let remote = Arc::new(MockRemote::new());

    let first_id;
    {
        let backend: Arc<dyn StorageBackend> =
            Arc::new(FileBackend::open(dir.path(), true).unwrap());
        let engine = engine_with(
            backend,
            Arc::clone(&remote),
            static_identity("token"),
            Arc::new(ManualClock::new(Timestamp::from_millis(1_000))),
        );
        let a = engine
            .create_record(RecordKind::Project, json!({ "name": "first" }))
            .unwrap();
        first_id = a.id;
        engine
            .create_record(RecordKind::Template, json!({ "name": "second" }))
            .unwrap();
        assert_eq!(engine.pending_count(), 2);
        // Process exits before anything could be pushed.
    }

    let backend: Arc<dyn StorageBackend> = Arc::new(FileBackend::open(dir.path(), true).unwrap());
    let engine = engine_with(
        backend,
        Arc::clone(&remote),
        static_identity("token"),
        Arc::new(ManualClock::new(Timestamp::from_millis(9_000))),
    );
    assert_eq!(engine.pending_count(), 2);
    assert_eq!(engine.list_records(None).unwrap().len(), 2);

    let summary = engine.trigger_drain().unwrap().unwrap();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(remote.records().len(), 2);
    // Push order followed enqueue order.
    assert!(matches!(
        remote.calls()[0],
        craftsync_engine::MockCall::Create(id) if id == first_id
    ));
}

#[test]
fn coalesced_offline_churn_pushes_once_per_record() {
    let remote = Arc::new(MockRemote::new());
    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
    let engine = engine_with(
        Arc::new(MemoryBackend::new()),
        Arc::clone(&remote),
        static_identity("token"),
        Arc::clone(&clock),
    );

    let keep = engine
        .create_record(RecordKind::Project, json!({ "rev": 0 }))
        .unwrap();
    for rev in 1..=10 {
        clock.advance(10);
        engine.update_record(&keep.id, json!({ "rev": rev })).unwrap();
    }
    let scrapped = engine
        .create_record(RecordKind::Project, json!({ "doomed": true }))
        .unwrap();
    clock.advance(10);
    engine.delete_record(&scrapped.id).unwrap();

    assert_eq!(engine.pending_count(), 2);
    let summary = engine.trigger_drain().unwrap().unwrap();
    assert_eq!(summary.succeeded, 2);

    // One create carrying the final payload, one delete that found nothing
    // at the remote. Eleven local writes cost two remote calls.
    assert_eq!(remote.call_count(), 2);
    assert_eq!(remote.records().len(), 1);
    assert_eq!(remote.record(&keep.id).unwrap().payload, json!({ "rev": 10 }));
}
