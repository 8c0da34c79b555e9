//! The durable mutation queue.

use std::sync::Arc;

use craftsync_protocol::{
    MutationKind, ProjectRecord, QueueItem, QueueItemId, RecordId, Timestamp,
};
use craftsync_store::{from_cbor, to_cbor, StorageBackend};
use parking_lot::RwLock;
use tracing::trace;

use crate::error::{SyncError, SyncResult};

/// Table holding pending queue items, keyed by item id.
pub const QUEUE_TABLE: &str = "queue";

/// Table holding queue bookkeeping.
const META_TABLE: &str = "meta";
const NEXT_SEQ_KEY: &str = "queue_next_seq";

struct QueueInner {
    /// Pending items, sorted by `seq`.
    items: Vec<QueueItem>,
    next_seq: u64,
}

/// A durable, ordered queue of pending mutations.
///
/// Every change is written through to the backend before it becomes visible
/// in memory, so the queue a restart loads is exactly the queue the last
/// process saw. At most one item exists per record id at all times; an
/// enqueue for a record with a pending item coalesces into it.
pub struct SyncQueue {
    backend: Arc<dyn StorageBackend>,
    inner: RwLock<QueueInner>,
}

impl SyncQueue {
    /// Opens the queue over a backend, loading any persisted items.
    pub fn open(backend: Arc<dyn StorageBackend>) -> SyncResult<Self> {
        let mut items = Vec::new();
        for (_, bytes) in backend.scan(QUEUE_TABLE)? {
            items.push(from_cbor::<QueueItem>(&bytes)?);
        }
        items.sort_by_key(|item| item.seq);

        let stored_next = match backend.read(META_TABLE, NEXT_SEQ_KEY)? {
            Some(bytes) => from_cbor::<u64>(&bytes)?,
            None => 0,
        };
        // The counter must clear every live item even if the meta write
        // was lost.
        let next_seq = items
            .last()
            .map_or(stored_next, |item| stored_next.max(item.seq + 1));

        Ok(Self {
            backend,
            inner: RwLock::new(QueueInner { items, next_seq }),
        })
    }

    /// Enqueues a mutation, coalescing with any pending item for the record.
    ///
    /// Returns the id of the surviving item. `snapshot` is required for
    /// creates and updates and ignored for deletes.
    pub fn enqueue(
        &self,
        record_id: RecordId,
        kind: MutationKind,
        snapshot: Option<&ProjectRecord>,
        now: Timestamp,
    ) -> SyncResult<QueueItemId> {
        let mut inner = self.inner.write();

        if let Some(pos) = inner
            .items
            .iter()
            .position(|item| item.record_id == record_id)
        {
            let merged = inner.items[pos].coalesce(kind, snapshot, now);
            self.persist_item(&merged)?;
            let id = merged.id;
            trace!(record_id = %record_id, kind = %merged.kind, "coalesced pending mutation");
            inner.items[pos] = merged;
            return Ok(id);
        }

        let seq = inner.next_seq;
        let item = match (kind, snapshot) {
            (MutationKind::Delete, _) => QueueItem::delete(seq, record_id, now),
            (MutationKind::Create, Some(record)) => QueueItem::create(seq, record, now),
            (MutationKind::Update, Some(record)) => QueueItem::update(seq, record, now),
            (_, None) => {
                return Err(SyncError::protocol(
                    "create and update mutations require a snapshot",
                ))
            }
        };
        self.persist_item(&item)?;
        self.persist_next_seq(seq + 1)?;
        let id = item.id;
        trace!(record_id = %record_id, kind = %item.kind, seq, "enqueued mutation");
        inner.items.push(item);
        inner.next_seq = seq + 1;
        Ok(id)
    }

    /// Pending items in push order.
    pub fn peek_all(&self) -> Vec<QueueItem> {
        self.inner.read().items.clone()
    }

    /// The pending item for a record, if any.
    pub fn pending_for(&self, record_id: &RecordId) -> Option<QueueItem> {
        self.inner
            .read()
            .items
            .iter()
            .find(|item| item.record_id == *record_id)
            .cloned()
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.inner.read().items.is_empty()
    }

    /// Removes a confirmed or evicted item. Unknown ids are a no-op.
    pub fn remove(&self, id: QueueItemId) -> SyncResult<()> {
        let mut inner = self.inner.write();
        if let Some(pos) = inner.items.iter().position(|item| item.id == id) {
            self.backend.remove(QUEUE_TABLE, &id.to_string())?;
            inner.items.remove(pos);
        }
        Ok(())
    }

    /// Bumps and persists an item's retry count, returning the new count.
    pub fn increment_retry(&self, id: QueueItemId) -> SyncResult<u32> {
        let mut inner = self.inner.write();
        let pos = inner
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| SyncError::protocol(format!("queue item {id} not found")))?;
        let mut item = inner.items[pos].clone();
        item.retry_count += 1;
        self.persist_item(&item)?;
        let count = item.retry_count;
        inner.items[pos] = item;
        Ok(count)
    }

    /// Rewrites every pending item referencing `old` to reference `new`.
    ///
    /// Used after a create is confirmed under a remote-assigned id. Returns
    /// the number of items changed.
    pub fn rewrite_record_id(&self, old: &RecordId, new: RecordId) -> SyncResult<usize> {
        let mut inner = self.inner.write();
        let mut changed = 0;
        for pos in 0..inner.items.len() {
            if inner.items[pos].record_id == *old {
                let mut item = inner.items[pos].clone();
                item.rewrite_record_id(new);
                self.persist_item(&item)?;
                inner.items[pos] = item;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn persist_item(&self, item: &QueueItem) -> SyncResult<()> {
        let bytes = to_cbor(item)?;
        self.backend.write(QUEUE_TABLE, &item.id.to_string(), &bytes)?;
        Ok(())
    }

    fn persist_next_seq(&self, next_seq: u64) -> SyncResult<()> {
        let bytes = to_cbor(&next_seq)?;
        self.backend.write(META_TABLE, NEXT_SEQ_KEY, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craftsync_protocol::RecordKind;
    use craftsync_store::MemoryBackend;
    use serde_json::json;

    fn record(name: &str, at: u64) -> ProjectRecord {
        ProjectRecord::new(
            RecordKind::Project,
            json!({ "name": name }),
            Timestamp::from_millis(at),
        )
    }

    fn open_queue(backend: &Arc<MemoryBackend>) -> SyncQueue {
        let backend: Arc<dyn StorageBackend> = backend.clone();
        SyncQueue::open(backend).unwrap()
    }

    #[test]
    fn enqueue_and_peek() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = open_queue(&backend);
        let a = record("a", 100);
        queue
            .enqueue(a.id, MutationKind::Create, Some(&a), Timestamp::from_millis(100))
            .unwrap();
        let items = queue.peek_all();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].record_id, a.id);
        assert_eq!(items[0].kind, MutationKind::Create);
        assert_eq!(items[0].seq, 0);
    }

    #[test]
    fn one_item_per_record_id() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = open_queue(&backend);
        let mut a = record("a", 100);
        queue
            .enqueue(a.id, MutationKind::Create, Some(&a), Timestamp::from_millis(100))
            .unwrap();
        a.apply_edit(json!({ "name": "a2" }), Timestamp::from_millis(200));
        queue
            .enqueue(a.id, MutationKind::Update, Some(&a), Timestamp::from_millis(200))
            .unwrap();
        assert_eq!(queue.len(), 1);
        // An update folds into the unconfirmed create.
        let item = queue.pending_for(&a.id).unwrap();
        assert_eq!(item.kind, MutationKind::Create);
        assert_eq!(
            item.snapshot.as_ref().unwrap().payload,
            json!({ "name": "a2" })
        );
    }

    #[test]
    fn delete_wins_over_pending_update() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = open_queue(&backend);
        let a = record("a", 100);
        queue
            .enqueue(a.id, MutationKind::Update, Some(&a), Timestamp::from_millis(100))
            .unwrap();
        queue
            .enqueue(a.id, MutationKind::Delete, None, Timestamp::from_millis(200))
            .unwrap();
        let item = queue.pending_for(&a.id).unwrap();
        assert_eq!(item.kind, MutationKind::Delete);
        assert!(item.snapshot.is_none());
    }

    #[test]
    fn order_follows_first_enqueue() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = open_queue(&backend);
        let a = record("a", 100);
        let b = record("b", 110);
        let c = record("c", 120);
        for r in [&a, &b, &c] {
            queue
                .enqueue(r.id, MutationKind::Create, Some(r), r.created_at)
                .unwrap();
        }
        // Coalescing must not move `a` behind `b` and `c`.
        queue
            .enqueue(a.id, MutationKind::Update, Some(&a), Timestamp::from_millis(130))
            .unwrap();
        let order: Vec<RecordId> = queue.peek_all().iter().map(|i| i.record_id).collect();
        assert_eq!(order, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn queue_survives_restart() {
        let backend = Arc::new(MemoryBackend::new());
        let a = record("a", 100);
        let b = record("b", 110);
        {
            let queue = open_queue(&backend);
            queue
                .enqueue(a.id, MutationKind::Create, Some(&a), Timestamp::from_millis(100))
                .unwrap();
            queue
                .enqueue(b.id, MutationKind::Delete, None, Timestamp::from_millis(110))
                .unwrap();
        }
        let reopened = open_queue(&backend);
        let items = reopened.peek_all();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].record_id, a.id);
        assert_eq!(items[1].record_id, b.id);
        assert_eq!(items[1].kind, MutationKind::Delete);
    }

    #[test]
    fn seq_counter_survives_restart() {
        let backend = Arc::new(MemoryBackend::new());
        let a = record("a", 100);
        {
            let queue = open_queue(&backend);
            let id = queue
                .enqueue(a.id, MutationKind::Create, Some(&a), Timestamp::from_millis(100))
                .unwrap();
            queue.remove(id).unwrap();
        }
        // The drained item must not let its seq be reissued.
        let reopened = open_queue(&backend);
        let b = record("b", 200);
        reopened
            .enqueue(b.id, MutationKind::Create, Some(&b), Timestamp::from_millis(200))
            .unwrap();
        assert_eq!(reopened.peek_all()[0].seq, 1);
    }

    #[test]
    fn retry_count_survives_restart() {
        let backend = Arc::new(MemoryBackend::new());
        let a = record("a", 100);
        let id = {
            let queue = open_queue(&backend);
            let id = queue
                .enqueue(a.id, MutationKind::Create, Some(&a), Timestamp::from_millis(100))
                .unwrap();
            assert_eq!(queue.increment_retry(id).unwrap(), 1);
            assert_eq!(queue.increment_retry(id).unwrap(), 2);
            id
        };
        let reopened = open_queue(&backend);
        let item = reopened.pending_for(&a.id).unwrap();
        assert_eq!(item.id, id);
        assert_eq!(item.retry_count, 2);
    }

    #[test]
    fn coalescing_resets_retry_count() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = open_queue(&backend);
        let a = record("a", 100);
        let id = queue
            .enqueue(a.id, MutationKind::Update, Some(&a), Timestamp::from_millis(100))
            .unwrap();
        queue.increment_retry(id).unwrap();
        queue
            .enqueue(a.id, MutationKind::Update, Some(&a), Timestamp::from_millis(200))
            .unwrap();
        assert_eq!(queue.pending_for(&a.id).unwrap().retry_count, 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = open_queue(&backend);
        let a = record("a", 100);
        let id = queue
            .enqueue(a.id, MutationKind::Create, Some(&a), Timestamp::from_millis(100))
            .unwrap();
        queue.remove(id).unwrap();
        queue.remove(id).unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn rewrite_updates_item_and_snapshot() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = open_queue(&backend);
        let a = record("a", 100);
        queue
            .enqueue(a.id, MutationKind::Update, Some(&a), Timestamp::from_millis(100))
            .unwrap();
        let new_id = RecordId::new();
        assert_eq!(queue.rewrite_record_id(&a.id, new_id).unwrap(), 1);
        assert!(queue.pending_for(&a.id).is_none());
        let item = queue.pending_for(&new_id).unwrap();
        assert_eq!(item.snapshot.as_ref().unwrap().id, new_id);

        // The rewrite is durable.
        let reopened = open_queue(&backend);
        assert!(reopened.pending_for(&new_id).is_some());
    }

    #[test]
    fn enqueue_without_snapshot_rejected() {
        let backend = Arc::new(MemoryBackend::new());
        let queue = open_queue(&backend);
        let err = queue
            .enqueue(
                RecordId::new(),
                MutationKind::Create,
                None,
                Timestamp::from_millis(100),
            )
            .unwrap_err();
        assert!(matches!(err, SyncError::Protocol(_)));
        assert!(queue.is_empty());
    }
}
