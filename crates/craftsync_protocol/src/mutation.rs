//! Pending mutations and the queue coalescing rule.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ProjectRecord, QueueItemId, RecordId, Timestamp};

/// The kind of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    /// Record created locally, not yet known to the remote.
    Create,
    /// Existing record modified locally.
    Update,
    /// Record deleted locally.
    Delete,
}

impl MutationKind {
    /// Converts to a stable code.
    #[must_use]
    pub const fn to_code(&self) -> u8 {
        match self {
            MutationKind::Create => 0,
            MutationKind::Update => 1,
            MutationKind::Delete => 2,
        }
    }

    /// Converts from a code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MutationKind::Create),
            1 => Some(MutationKind::Update),
            2 => Some(MutationKind::Delete),
            _ => None,
        }
    }

    /// Returns the wire name for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }

    /// True for mutations that end a record's queue history.
    ///
    /// A delete absorbs any pending create or update and nothing coalesces
    /// into a delete except another delete.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, MutationKind::Delete)
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending mutation awaiting push.
///
/// The snapshot is a full copy of the record taken at enqueue time, so an
/// in-flight push never observes a half-applied edit. Only `retry_count`
/// mutates in place; the id-rewrite after a confirmed create is the single
/// sanctioned exception (see [`QueueItem::rewrite_record_id`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Queue-local identity, stable across coalescing.
    pub id: QueueItemId,
    /// Enqueue order, persisted; lower pushes first.
    pub seq: u64,
    /// The record this mutation targets.
    pub record_id: RecordId,
    /// What to perform at the remote.
    pub kind: MutationKind,
    /// Full record copy at enqueue time; `None` for deletes.
    pub snapshot: Option<ProjectRecord>,
    /// When the latest coalesced mutation was enqueued.
    pub enqueued_at: Timestamp,
    /// Failed push attempts so far; persisted across restarts.
    pub retry_count: u32,
}

impl QueueItem {
    /// Builds a create item snapshotting `record`.
    #[must_use]
    pub fn create(seq: u64, record: &ProjectRecord, now: Timestamp) -> Self {
        Self {
            id: QueueItemId::new(),
            seq,
            record_id: record.id,
            kind: MutationKind::Create,
            snapshot: Some(record.clone()),
            enqueued_at: now,
            retry_count: 0,
        }
    }

    /// Builds an update item snapshotting `record`.
    #[must_use]
    pub fn update(seq: u64, record: &ProjectRecord, now: Timestamp) -> Self {
        Self {
            id: QueueItemId::new(),
            seq,
            record_id: record.id,
            kind: MutationKind::Update,
            snapshot: Some(record.clone()),
            enqueued_at: now,
            retry_count: 0,
        }
    }

    /// Builds a delete item. Deletes carry no snapshot.
    #[must_use]
    pub fn delete(seq: u64, record_id: RecordId, now: Timestamp) -> Self {
        Self {
            id: QueueItemId::new(),
            seq,
            record_id,
            kind: MutationKind::Delete,
            snapshot: None,
            enqueued_at: now,
            retry_count: 0,
        }
    }

    /// Folds a newer mutation for the same record into this item.
    ///
    /// Rules, in priority order:
    /// - a delete replaces anything (deletion is terminal);
    /// - an update folds into a pending create, which keeps its kind but
    ///   adopts the newer snapshot (the remote has never seen the record);
    /// - otherwise the newer mutation replaces this one outright.
    ///
    /// The merged item keeps this item's `id` and `seq` — its queue position
    /// — and starts with a fresh retry budget, since it carries a new
    /// effective mutation.
    #[must_use]
    pub fn coalesce(
        &self,
        kind: MutationKind,
        snapshot: Option<&ProjectRecord>,
        now: Timestamp,
    ) -> QueueItem {
        let merged_kind = match (self.kind, kind) {
            (_, MutationKind::Delete) => MutationKind::Delete,
            (MutationKind::Create, MutationKind::Update) => MutationKind::Create,
            (_, incoming) => incoming,
        };
        let merged_snapshot = match merged_kind {
            MutationKind::Delete => None,
            _ => snapshot.cloned(),
        };
        QueueItem {
            id: self.id,
            seq: self.seq,
            record_id: self.record_id,
            kind: merged_kind,
            snapshot: merged_snapshot,
            enqueued_at: now,
            retry_count: 0,
        }
    }

    /// Rewrites the record identity after the remote assigned a new ID.
    ///
    /// Applies to both the item and the id embedded in its snapshot, so a
    /// later push targets the confirmed identity.
    pub fn rewrite_record_id(&mut self, new_id: RecordId) {
        self.record_id = new_id;
        if let Some(snapshot) = &mut self.snapshot {
            snapshot.id = new_id;
        }
    }
}
