//! In-memory storage backend for testing.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::backend::StorageBackend;
use crate::error::StoreResult;

type Tables = BTreeMap<String, BTreeMap<String, Vec<u8>>>;

/// An in-memory storage backend.
///
/// This backend keeps all tables in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use craftsync_store::{MemoryBackend, StorageBackend};
///
/// let backend = MemoryBackend::new();
/// backend.write("records", "a", b"one").unwrap();
/// assert_eq!(backend.read("records", "a").unwrap(), Some(b"one".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with tables.
    ///
    /// Useful for testing recovery scenarios together with [`snapshot`].
    ///
    /// [`snapshot`]: MemoryBackend::snapshot
    #[must_use]
    pub fn from_snapshot(tables: BTreeMap<String, BTreeMap<String, Vec<u8>>>) -> Self {
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Returns a deep copy of every table.
    ///
    /// Feed the result to [`from_snapshot`] to simulate a process restart.
    ///
    /// [`from_snapshot`]: MemoryBackend::from_snapshot
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, BTreeMap<String, Vec<u8>>> {
        self.tables.read().clone()
    }

    /// Clears all tables.
    pub fn clear(&self) {
        self.tables.write().clear();
    }

    /// Number of keys currently held in `table`.
    #[must_use]
    pub fn key_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, table: &str, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .tables
            .read()
            .get(table)
            .and_then(|t| t.get(key))
            .cloned())
    }

    fn write(&self, table: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn remove(&self, table: &str, key: &str) -> StoreResult<()> {
        if let Some(t) = self.tables.write().get_mut(table) {
            t.remove(key);
        }
        Ok(())
    }

    fn scan(&self, table: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .tables
            .read()
            .get(table)
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}
