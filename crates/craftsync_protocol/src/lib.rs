//! # craftsync Protocol
//!
//! Data model and sync protocol types for craftsync.
//!
//! This crate provides:
//! - [`ProjectRecord`] — the unit of synchronization
//! - [`QueueItem`] and the queue coalescing rule
//! - [`ConflictPolicy`] for whole-record conflict resolution
//! - Remote acknowledgement messages ([`CreateAck`], [`UpdateAck`])
//!
//! This is a pure model crate with no I/O operations.
//!
//! ## Example
//!
//! ```rust
//! use craftsync_protocol::{ProjectRecord, RecordKind, Timestamp};
//!
//! let now = Timestamp::from_millis(1_700_000_000_000);
//! let record = ProjectRecord::new(RecordKind::Project, serde_json::json!({}), now);
//! assert_eq!(record.created_at, record.updated_at);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod conflict;
mod id;
mod messages;
mod mutation;
mod record;
mod time;

pub use conflict::{Conflict, ConflictPolicy, ConflictWinner};
pub use id::{QueueItemId, RecordId};
pub use messages::{CreateAck, UpdateAck};
pub use mutation::{MutationKind, QueueItem};
pub use record::{ProjectRecord, RecordKind};
pub use time::Timestamp;
