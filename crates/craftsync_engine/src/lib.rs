//! # craftsync Engine
//!
//! Offline-first synchronization engine for craftsync.
//!
//! Features:
//! - **Local-first writes**: every create, update, and delete lands in the
//!   local store and succeeds regardless of connectivity
//! - **Durable mutation queue**: pending changes survive restarts, coalesce
//!   per record, and push in first-enqueue order
//! - **Push/pull passes**: order-preserving push with per-item retry
//!   budgets, pull with pluggable conflict policies
//! - **Typed events**: subscribe to pass lifecycle, conflicts, and
//!   connectivity transitions
//! - **Injected collaborators**: remote service, identity provider, and
//!   clock are traits, so tests run hermetically
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use craftsync_engine::{
//!     Identity, MockRemote, StaticIdentity, SyncConfig, SyncEngine, SyncQueue, SystemClock,
//! };
//! use craftsync_protocol::RecordKind;
//! use craftsync_store::{MemoryBackend, ProjectStore, StorageBackend};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), craftsync_engine::SyncError> {
//! let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
//! let store = ProjectStore::new(Arc::clone(&backend));
//! let queue = SyncQueue::open(Arc::clone(&backend))?;
//! let engine = SyncEngine::new(
//!     SyncConfig::new(),
//!     store,
//!     queue,
//!     Arc::new(MockRemote::new()),
//!     Arc::new(StaticIdentity::new(Identity::new("studio", "token"))),
//!     Arc::new(SystemClock::new()),
//! );
//!
//! let record = engine.create_record(RecordKind::Project, json!({ "name": "Poster" }))?;
//! assert!(engine.get_record(&record.id)?.is_some());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Engine crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod clock;
mod config;
mod error;
mod events;
mod http;
mod identity;
mod monitor;
mod queue;
mod remote;
mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use events::{EventBus, EventSubscription, SubscriptionId, SyncEvent};
pub use http::{HttpClient, HttpMethod, HttpRemote, HttpResponse};
pub use identity::{Identity, IdentityProvider, MemoizedIdentity, NoIdentity, StaticIdentity};
pub use monitor::{NetworkMonitor, NetworkStatus};
pub use queue::{SyncQueue, QUEUE_TABLE};
pub use remote::{MockCall, MockRemote, RemoteService};
pub use state::{
    EngineStatus, PullSummary, PushSummary, SyncEngine, SyncReport, SyncStats,
};
