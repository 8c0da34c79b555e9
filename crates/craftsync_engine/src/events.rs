//! Typed sync events and the subscription bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

use craftsync_protocol::RecordId;
use parking_lot::RwLock;

/// Events emitted by the sync engine.
///
/// The bus is a notification channel, never a command channel: consumers
/// render status from it, they do not drive the engine through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A sync pass started.
    SyncStarted,
    /// A sync pass finished.
    SyncCompleted {
        /// Items confirmed by the remote during the pass.
        succeeded: u64,
        /// Items dropped after exhausting their retry budget.
        failed: u64,
    },
    /// Pull found the local and remote copies of a record diverged.
    ConflictDetected {
        /// The divergent record.
        record_id: RecordId,
    },
    /// Connectivity was lost.
    Offline,
    /// Connectivity returned.
    Online,
}

/// Identifies one subscription on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// A live subscription: poll the receiver, keep the id to unsubscribe.
#[derive(Debug)]
pub struct EventSubscription {
    /// Identifies this subscription for [`EventBus::unsubscribe`].
    pub id: SubscriptionId,
    /// Receives events in emission order.
    pub receiver: Receiver<SyncEvent>,
}

/// Distributes engine events to subscribers.
///
/// Every subscriber sees every event emitted after it subscribed, in
/// emission order. Subscribers whose receiver was dropped are pruned on
/// the next emit.
pub struct EventBus {
    subscribers: RwLock<Vec<(SubscriptionId, Sender<SyncEvent>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> EventSubscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push((id, tx));
        EventSubscription { id, receiver: rx }
    }

    /// Removes a subscription. Unknown ids are a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.write().retain(|(sid, _)| *sid != id);
    }

    /// Delivers an event to every live subscriber.
    pub fn emit(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    /// Number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
