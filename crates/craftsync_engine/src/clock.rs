//! Time sources.

use std::time::{SystemTime, UNIX_EPOCH};

use craftsync_protocol::Timestamp;
use parking_lot::RwLock;

/// A source of the current time.
///
/// The engine never reads the system clock directly. Injecting the clock
/// keeps timestamp-sensitive behavior (coalescing, conflict resolution)
/// deterministic under test.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Timestamp::from_millis(millis)
    }
}

/// A manually driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: RwLock<Timestamp>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Moves the clock to an absolute time.
    pub fn set(&self, now: Timestamp) {
        *self.now.write() = now;
    }

    /// Advances the clock by `millis`.
    pub fn advance(&self, millis: u64) {
        let mut now = self.now.write();
        *now = now.saturating_add_millis(millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.read()
    }
}
