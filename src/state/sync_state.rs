// ============================================================================
// SYNC STATE - observable {isOnline, isSyncing, pendingCount}
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::models::sync::{DrainReport, SyncSnapshot, SyncState};

type Listener = Rc<dyn Fn(&SyncSnapshot)>;

/// Presentation state for one device. Clones share the same cells.
#[derive(Clone, Default)]
pub struct SyncStateWrapper {
    is_online: Rc<Cell<bool>>,
    is_syncing: Rc<Cell<bool>>,
    pending_count: Rc<Cell<usize>>,
    last_sync_attempt: Rc<Cell<Option<DateTime<Utc>>>>,
    last_report: Rc<RefCell<Option<DrainReport>>>,
    listeners: Rc<RefCell<Vec<Listener>>>,
}

impl SyncStateWrapper {
    pub fn new(is_online: bool, pending_count: usize) -> Self {
        let state = Self::default();
        state.is_online.set(is_online);
        state.pending_count.set(pending_count);
        state
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            is_online: self.is_online.get(),
            is_syncing: self.is_syncing.get(),
            pending_count: self.pending_count.get(),
        }
    }

    pub fn sync_state(&self) -> SyncState {
        self.snapshot().state()
    }

    pub fn is_online(&self) -> bool {
        self.is_online.get()
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.get()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_count.get()
    }

    pub fn set_online(&self, online: bool) {
        if self.is_online.replace(online) != online {
            self.notify();
        }
    }

    pub fn set_syncing(&self, syncing: bool) {
        if self.is_syncing.replace(syncing) != syncing {
            self.notify();
        }
    }

    pub fn set_pending_count(&self, count: usize) {
        if self.pending_count.replace(count) != count {
            self.notify();
        }
    }

    pub fn last_sync_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_sync_attempt.get()
    }

    pub fn last_report(&self) -> Option<DrainReport> {
        self.last_report.borrow().clone()
    }

    pub fn record_drain(&self, at: DateTime<Utc>, report: DrainReport) {
        self.last_sync_attempt.set(Some(at));
        *self.last_report.borrow_mut() = Some(report);
    }

    /// Called after every change of the snapshot. Listeners may subscribe
    /// others; those only see later changes.
    pub fn subscribe(&self, listener: impl Fn(&SyncSnapshot) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    fn notify(&self) {
        let snapshot = self.snapshot();
        let listeners: Vec<Listener> = self.listeners.borrow().clone();
        for listener in listeners {
            listener(&snapshot);
        }
    }
}
