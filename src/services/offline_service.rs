// ============================================================================
// OFFLINE QUEUE - durable FIFO of pending mutations
// ============================================================================
// The in-memory queue is authoritative for the session. Every mutation of it
// is followed by a persist; a failed persist is reported to the caller and
// the next successful one catches storage up.
// ============================================================================

use std::collections::HashSet;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::error::{PersistenceError, QueueError};
use crate::models::pending_action::{ActionKind, Collection, PendingAction, PendingActionsQueue};
use crate::utils::storage::{load_json, save_json, KeyValueStorage};

pub struct OfflineQueue {
    storage: Rc<dyn KeyValueStorage>,
    key: String,
    queue: PendingActionsQueue,
}

impl OfflineQueue {
    /// Loads whatever a previous session persisted under `key`.
    pub fn open(storage: Rc<dyn KeyValueStorage>, key: &str) -> Result<Self, PersistenceError> {
        let mut queue = load_json::<PendingActionsQueue>(&*storage, key)?.unwrap_or_default();

        let mut seen = HashSet::with_capacity(queue.actions.len());
        let before = queue.actions.len();
        queue.actions.retain(|a| seen.insert(a.id));
        if queue.actions.len() != before {
            log::warn!("⚠️ Dropped {} duplicated pending actions", before - queue.actions.len());
        }

        log::info!("📋 Offline queue loaded: {} pending, {} retries", queue.len(), queue.retry_count);
        Ok(Self {
            storage,
            key: key.to_string(),
            queue,
        })
    }

    /// Appends and persists. Nothing is queued when persisting fails.
    pub fn enqueue(
        &mut self,
        kind: ActionKind,
        collection: Collection,
        payload: Value,
    ) -> Result<Uuid, QueueError> {
        let action = PendingAction::new(kind, collection, payload)?;
        let id = action.id;

        self.queue.actions.push(action);
        if let Err(e) = self.persist() {
            self.queue.actions.pop();
            return Err(e.into());
        }

        log::info!("📝 Queued {} on {} ({} pending)", kind, collection, self.len());
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// FIFO snapshot of the queued actions.
    pub fn actions(&self) -> Vec<PendingAction> {
        self.queue.actions.clone()
    }

    /// Drops delivered actions. Survivors keep their relative order.
    pub fn resolve(&mut self, delivered: &[Uuid]) -> usize {
        let delivered: HashSet<&Uuid> = delivered.iter().collect();
        let before = self.queue.len();
        self.queue.actions.retain(|a| !delivered.contains(&a.id));
        before - self.queue.len()
    }

    /// Bookkeeping after a drain pass: a clean pass resets the backoff.
    pub fn record_attempt(&mut self, all_delivered: bool, now: DateTime<Utc>) {
        if all_delivered {
            self.queue.reset_retry();
        } else {
            self.queue.increment_retry(now);
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.queue.retry_count
    }

    pub fn backoff_remaining_at(&self, now: DateTime<Utc>, retry: &RetryConfig) -> i64 {
        self.queue.backoff_remaining_at(now, retry)
    }

    pub fn persist(&self) -> Result<(), PersistenceError> {
        if self.queue.is_empty() && self.queue.retry_count == 0 {
            return self.storage.remove(&self.key);
        }
        save_json(&*self.storage, &self.key, &self.queue)?;
        log::debug!("💾 Queue persisted: {} actions", self.queue.len());
        Ok(())
    }
}
