//! Network status tracking.

use std::fmt;

use parking_lot::RwLock;

/// Connectivity as reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// The network is reachable.
    Online,
    /// The network is unreachable.
    Offline,
}

impl NetworkStatus {
    /// True when the network is reachable.
    pub fn is_online(&self) -> bool {
        matches!(self, NetworkStatus::Online)
    }

    /// Maps a boolean reachability flag to a status.
    pub fn from_online(online: bool) -> Self {
        if online {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        }
    }
}

impl fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkStatus::Online => f.write_str("online"),
            NetworkStatus::Offline => f.write_str("offline"),
        }
    }
}

/// Debounces raw connectivity readings into transitions.
///
/// Platform callbacks tend to repeat the current state; the engine only
/// cares about edges. Hosts feed every reading into [`observe`] and forward
/// the `Some` results to [`SyncEngine::handle_network_change`].
///
/// [`observe`]: NetworkMonitor::observe
/// [`SyncEngine::handle_network_change`]: crate::SyncEngine::handle_network_change
pub struct NetworkMonitor {
    status: RwLock<NetworkStatus>,
}

impl NetworkMonitor {
    /// Creates a monitor with an assumed starting status.
    pub fn new(initial: NetworkStatus) -> Self {
        Self {
            status: RwLock::new(initial),
        }
    }

    /// Current status.
    pub fn status(&self) -> NetworkStatus {
        *self.status.read()
    }

    /// True when the last reading was online.
    pub fn is_online(&self) -> bool {
        self.status().is_online()
    }

    /// Records a reading; returns the new status only when it changed.
    pub fn observe(&self, online: bool) -> Option<NetworkStatus> {
        let next = NetworkStatus::from_online(online);
        let mut status = self.status.write();
        if *status == next {
            None
        } else {
            *status = next;
            Some(next)
        }
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::Online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_readings_are_swallowed() {
        let monitor = NetworkMonitor::new(NetworkStatus::Online);
        assert_eq!(monitor.observe(true), None);
        assert_eq!(monitor.observe(true), None);
        assert!(monitor.is_online());
    }

    #[test]
    fn transitions_are_reported() {
        let monitor = NetworkMonitor::new(NetworkStatus::Online);
        assert_eq!(monitor.observe(false), Some(NetworkStatus::Offline));
        assert_eq!(monitor.observe(false), None);
        assert_eq!(monitor.observe(true), Some(NetworkStatus::Online));
        assert!(monitor.is_online());
    }

    #[test]
    fn initial_status_counts_as_seen() {
        let monitor = NetworkMonitor::new(NetworkStatus::Offline);
        assert_eq!(monitor.observe(false), None);
        assert_eq!(monitor.observe(true), Some(NetworkStatus::Online));
    }

    #[test]
    fn status_display() {
        assert_eq!(NetworkStatus::Online.to_string(), "online");
        assert_eq!(NetworkStatus::Offline.to_string(), "offline");
    }
}
