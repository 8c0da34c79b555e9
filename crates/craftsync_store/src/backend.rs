//! Storage backend trait definition.

use crate::error::StoreResult;

/// A low-level storage medium for craftsync.
///
/// Backends are **opaque byte stores** organized as named tables of keyed
/// values. They provide read, write, remove, and scan; the layers above own
/// all interpretation — backends do not understand records, queue items, or
/// CBOR.
///
/// # Invariants
///
/// - `read` returns exactly the bytes last written under that key, or `None`
/// - `write` is durable when it returns (for persistent backends)
/// - `remove` of an absent key is a no-op
/// - `scan` returns entries in ascending key order
/// - Backends must be `Send + Sync`; all methods take `&self` and rely on
///   interior synchronization
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - For testing and ephemeral stores
/// - [`super::FileBackend`] - For persistent storage using OS file APIs
pub trait StorageBackend: Send + Sync {
    /// Reads the value under `key` in `table`.
    ///
    /// Returns `None` if the key is absent. A missing table reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the key name is unusable or an I/O error occurs.
    fn read(&self, table: &str, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Writes `data` under `key` in `table`, creating the table if needed.
    ///
    /// When this returns successfully the value is durable: it survives
    /// process termination (for persistent backends).
    ///
    /// # Errors
    ///
    /// Returns an error if the key name is unusable or an I/O error occurs.
    fn write(&self, table: &str, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Removes the value under `key` in `table`.
    ///
    /// Removing an absent key succeeds silently.
    ///
    /// # Errors
    ///
    /// Returns an error if the key name is unusable or an I/O error occurs.
    fn remove(&self, table: &str, key: &str) -> StoreResult<()>;

    /// Returns every `(key, value)` pair in `table`, in ascending key order.
    ///
    /// A missing table scans as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn scan(&self, table: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;
}
