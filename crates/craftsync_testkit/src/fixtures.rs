//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up test stores
//! and common sync scenarios.

use std::path::PathBuf;
use std::sync::Arc;

use craftsync_store::{FileBackend, MemoryBackend, ProjectStore, StorageBackend};
use tempfile::TempDir;

/// File name used for file-backed test stores.
const STORE_FILE: &str = "craftsync.db";

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The storage backend, shared with any queue opened on top of it.
    pub backend: Arc<dyn StorageBackend>,
    /// The record store.
    pub store: ProjectStore,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a new in-memory test store.
    pub fn memory() -> Self {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        Self {
            store: ProjectStore::new(Arc::clone(&backend)),
            backend,
            _temp_dir: None,
        }
    }

    /// Creates a new file-backed test store.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let backend: Arc<dyn StorageBackend> = Arc::new(
            FileBackend::open(&temp_dir.path().join(STORE_FILE), true)
                .expect("Failed to open file backend"),
        );
        Self {
            store: ProjectStore::new(Arc::clone(&backend)),
            backend,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store path if file-backed, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self._temp_dir.as_ref().map(|d| d.path().join(STORE_FILE))
    }
}

impl std::ops::Deref for TestStore {
    type Target = ProjectStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary in-memory store.
///
/// # Example
///
/// ```rust,ignore
/// use craftsync_testkit::with_memory_store;
///
/// #[test]
/// fn my_test() {
///     with_memory_store(|store| {
///         // ... test operations
///     });
/// }
/// ```
pub fn with_memory_store<F, R>(f: F) -> R
where
    F: FnOnce(&ProjectStore) -> R,
{
    let fixture = TestStore::memory();
    f(&fixture.store)
}

/// Runs a test with a temporary file-backed store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&ProjectStore, &std::path::Path) -> R,
{
    let fixture = TestStore::file();
    let path = fixture.path().expect("File store should have a path");
    f(&fixture.store, &path)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use craftsync_engine::SyncQueue;
    use craftsync_protocol::{MutationKind, ProjectRecord, RecordKind, Timestamp};
    use serde_json::json;

    /// Creates a store pre-populated with project records.
    pub fn populated_store(record_count: usize) -> TestStore {
        let fixture = TestStore::memory();

        for i in 0..record_count {
            let record = ProjectRecord::new(
                RecordKind::Project,
                json!({ "index": i }),
                Timestamp::from_millis(1_000 + i as u64),
            );
            fixture.store.put(&record).expect("Failed to put record");
        }

        fixture
    }

    /// Creates a store whose queue holds one pending create per record.
    ///
    /// Returns the fixture and the queue so tests can drain or inspect it.
    pub fn store_with_pending_creates(record_count: usize) -> (TestStore, SyncQueue) {
        let fixture = TestStore::memory();
        let queue = SyncQueue::open(Arc::clone(&fixture.backend)).expect("Failed to open queue");

        for i in 0..record_count {
            let now = Timestamp::from_millis(1_000 + i as u64);
            let record = ProjectRecord::new(RecordKind::Project, json!({ "index": i }), now);
            fixture.store.put(&record).expect("Failed to put record");
            queue
                .enqueue(record.id, MutationKind::Create, Some(&record), now)
                .expect("Failed to enqueue create");
        }

        (fixture, queue)
    }
}
