//! # craftsync Store
//!
//! Durable local storage for craftsync.
//!
//! This crate provides the persistence layer the sync engine sits on:
//!
//! - [`StorageBackend`] — a table-scoped key-value medium. Backends are
//!   **opaque byte stores**; they do not interpret what they hold.
//! - [`MemoryBackend`] — for tests and ephemeral stores
//! - [`FileBackend`] — a locked directory with one file per key and
//!   crash-safe writes
//! - [`ProjectStore`] — the typed record table the application reads and
//!   writes
//!
//! The store is authoritative and never reaches for the network. Pairing a
//! local mutation with a sync-queue entry is the engine's job.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use craftsync_protocol::{ProjectRecord, RecordKind, Timestamp};
//! use craftsync_store::{MemoryBackend, ProjectStore};
//!
//! let backend = Arc::new(MemoryBackend::new());
//! let store = ProjectStore::new(backend);
//!
//! let record = ProjectRecord::new(
//!     RecordKind::Project,
//!     serde_json::json!({"title": "poster"}),
//!     Timestamp::from_millis(1),
//! );
//! store.put(&record).unwrap();
//! assert_eq!(store.get(&record.id).unwrap(), Some(record));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod codec;
mod error;
mod file;
mod memory;
mod records;

pub use backend::StorageBackend;
pub use codec::{from_cbor, to_cbor};
pub use error::{StoreError, StoreResult};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use records::{ProjectStore, RECORDS_TABLE};
