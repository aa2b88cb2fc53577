use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Phase of the offline sync state machine.
///
/// `Offline` -> (connectivity restored) -> `Draining` -> `Idle` or `PendingRemainder`
/// -> (connectivity lost) -> `Offline`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase")]
pub enum SyncState {
    #[serde(rename_all = "camelCase")]
    Offline { pending_count: usize },
    #[serde(rename_all = "camelCase")]
    Draining { pending_count: usize },
    Idle,
    PendingRemainder { count: usize },
}

impl SyncState {
    pub fn derive(is_online: bool, is_syncing: bool, pending_count: usize) -> Self {
        match (is_online, is_syncing, pending_count) {
            (false, _, pending_count) => SyncState::Offline { pending_count },
            (true, true, pending_count) => SyncState::Draining { pending_count },
            (true, false, 0) => SyncState::Idle,
            (true, false, count) => SyncState::PendingRemainder { count },
        }
    }
}

/// What the presentation layer renders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSnapshot {
    pub is_online: bool,
    pub is_syncing: bool,
    pub pending_count: usize,
}

impl SyncSnapshot {
    pub fn state(&self) -> SyncState {
        SyncState::derive(self.is_online, self.is_syncing, self.pending_count)
    }

    /// "3 pending changes", or `None` when nothing waits.
    pub fn label(&self) -> Option<String> {
        match self.pending_count {
            0 => None,
            1 => Some("1 pending change".to_string()),
            n => Some(format!("{} pending changes", n)),
        }
    }
}

/// Result of one full pass over the queue.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Queue length after the pass, including actions enqueued while it ran.
    pub remaining: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_error: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DrainOutcome {
    /// Connectivity not confirmed, nothing attempted.
    Offline,
    /// Another drain is in flight.
    AlreadyRunning,
    Empty,
    /// Periodic retry skipped because the backoff window is still open.
    #[serde(rename_all = "camelCase")]
    BackingOff { remaining_seconds: i64 },
    Completed(DrainReport),
}

impl DrainOutcome {
    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            DrainOutcome::Completed(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SubmitOutcome {
    /// Backend accepted the mutation; carries its response body.
    Applied { response: Value },
    #[serde(rename_all = "camelCase")]
    Queued { action_id: Uuid },
}
