//! Typed record table over a storage backend.

use std::sync::Arc;

use craftsync_protocol::{ProjectRecord, RecordId, RecordKind};

use crate::backend::StorageBackend;
use crate::codec::{from_cbor, to_cbor};
use crate::error::StoreResult;

/// Table name for project records.
pub const RECORDS_TABLE: &str = "records";

/// The local, authoritative store of project records.
///
/// Every operation is synchronous and durable when it returns, and none of
/// them touches the network — reads are answered from local state whether the
/// device is online or not. The store knows nothing about synchronization;
/// pairing a mutation with a sync-queue entry is the engine's job.
#[derive(Clone)]
pub struct ProjectStore {
    backend: Arc<dyn StorageBackend>,
}

impl ProjectStore {
    /// Creates a store over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Returns the record with the given ID, if present.
    pub fn get(&self, id: &RecordId) -> StoreResult<Option<ProjectRecord>> {
        match self.backend.read(RECORDS_TABLE, &id.to_string())? {
            Some(bytes) => Ok(Some(from_cbor(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Inserts or replaces a record, keyed by its ID.
    pub fn put(&self, record: &ProjectRecord) -> StoreResult<()> {
        let bytes = to_cbor(record)?;
        self.backend
            .write(RECORDS_TABLE, &record.id.to_string(), &bytes)
    }

    /// Removes a record. Absent IDs are a no-op.
    pub fn delete(&self, id: &RecordId) -> StoreResult<()> {
        self.backend.remove(RECORDS_TABLE, &id.to_string())
    }

    /// Lists records, optionally restricted to one kind.
    ///
    /// Results are ordered by creation time, then ID, so repeated calls see
    /// a stable order.
    pub fn list(&self, filter: Option<RecordKind>) -> StoreResult<Vec<ProjectRecord>> {
        let mut records = Vec::new();
        for (_key, bytes) in self.backend.scan(RECORDS_TABLE)? {
            let record: ProjectRecord = from_cbor(&bytes)?;
            if filter.map_or(true, |kind| record.kind == kind) {
                records.push(record);
            }
        }
        records.sort_by_key(|r| (r.created_at, r.id));
        Ok(records)
    }

    /// Number of stored records.
    pub fn count(&self) -> StoreResult<usize> {
        Ok(self.backend.scan(RECORDS_TABLE)?.len())
    }
}
