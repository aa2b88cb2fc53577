// ============================================================================
// NETWORK MONITOR
// ============================================================================
// Holds the last known connectivity and turns raw status reports into
// transitions. Only a transition to Online triggers a drain.
// ============================================================================

use std::cell::Cell;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
    Unknown,
}

impl From<bool> for NetworkStatus {
    fn from(online: bool) -> Self {
        if online {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkTransition {
    WentOnline,
    WentOffline,
}

#[derive(Clone)]
pub struct NetworkMonitor {
    status: Rc<Cell<NetworkStatus>>,
}

impl NetworkMonitor {
    pub fn new(initial: NetworkStatus) -> Self {
        Self {
            status: Rc::new(Cell::new(initial)),
        }
    }

    /// Seeded from `navigator.onLine`.
    #[cfg(target_arch = "wasm32")]
    pub fn from_navigator() -> Self {
        let status = web_sys::window()
            .map(|w| NetworkStatus::from(w.navigator().on_line()))
            .unwrap_or(NetworkStatus::Unknown);
        Self::new(status)
    }

    pub fn current_status(&self) -> NetworkStatus {
        self.status.get()
    }

    /// Only a confirmed `Online` counts; `Unknown` is not enough to drain.
    pub fn is_online(&self) -> bool {
        matches!(self.current_status(), NetworkStatus::Online)
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.current_status(), NetworkStatus::Offline)
    }

    /// Records `status` and reports the transition it caused, if any.
    pub fn update(&self, status: NetworkStatus) -> Option<NetworkTransition> {
        let previous = self.status.replace(status);
        match (previous, status) {
            (NetworkStatus::Online, NetworkStatus::Online) => None,
            (NetworkStatus::Offline, NetworkStatus::Offline) => None,
            (_, NetworkStatus::Online) => {
                log::info!("🌐 Network: ONLINE");
                Some(NetworkTransition::WentOnline)
            }
            (_, NetworkStatus::Offline) => {
                log::warn!("📴 Network: OFFLINE");
                Some(NetworkTransition::WentOffline)
            }
            (_, NetworkStatus::Unknown) => None,
        }
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(NetworkStatus::Unknown)
    }
}
