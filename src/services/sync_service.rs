// ============================================================================
// SYNC SERVICE - offline queue replay
// ============================================================================
// Owns the offline queue, the backend client and the network monitor.
// At most one drain runs at a time; a second trigger while draining is a
// no-op. A drain attempts every queued action once, in FIFO order, and
// persists the survivors once at the end.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::config::RetryConfig;
use crate::error::QueueError;
use crate::models::pending_action::{ActionKind, Collection, PendingAction};
use crate::models::sync::{DrainOutcome, DrainReport, SubmitOutcome, SyncSnapshot, SyncState};
use crate::services::api_client::MutationBackend;
use crate::services::network_monitor::{NetworkMonitor, NetworkStatus, NetworkTransition};
use crate::services::offline_service::OfflineQueue;
use crate::state::sync_state::SyncStateWrapper;

#[derive(Clone)]
pub struct SyncService {
    inner: Rc<Inner>,
}

struct Inner {
    queue: RefCell<OfflineQueue>,
    backend: Rc<dyn MutationBackend>,
    network: NetworkMonitor,
    state: SyncStateWrapper,
    retry: RetryConfig,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    auto_sync_started: Cell<bool>,
}

thread_local! {
    static SHARED: RefCell<HashMap<String, SyncService>> = RefCell::new(HashMap::new());
}

/// Keeps `is_syncing` set for the lifetime of a drain, even if its future is dropped.
struct SyncingGuard<'a>(&'a SyncStateWrapper);

impl<'a> SyncingGuard<'a> {
    fn begin(state: &'a SyncStateWrapper) -> Self {
        state.set_syncing(true);
        Self(state)
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.set_syncing(false);
    }
}

impl SyncService {
    pub fn new(
        queue: OfflineQueue,
        backend: Rc<dyn MutationBackend>,
        network: NetworkMonitor,
        retry: RetryConfig,
    ) -> Self {
        let state = SyncStateWrapper::new(network.is_online(), queue.len());
        Self {
            inner: Rc::new(Inner {
                queue: RefCell::new(queue),
                backend,
                network,
                state,
                retry,
                auto_sync_started: Cell::new(false),
            }),
        }
    }

    /// The one service bound to `key` on this thread, built on first use.
    ///
    /// Every handle for the same storage key shares one queue, one syncing
    /// flag and one set of listeners.
    pub fn shared<E>(key: &str, build: impl FnOnce() -> Result<Self, E>) -> Result<Self, E> {
        if let Some(existing) = SHARED.with(|shared| shared.borrow().get(key).cloned()) {
            log::debug!("♻️ Reusing sync service for {}", key);
            return Ok(existing);
        }
        let service = build()?;
        SHARED.with(|shared| shared.borrow_mut().insert(key.to_string(), service.clone()));
        Ok(service)
    }

    pub fn state(&self) -> &SyncStateWrapper {
        &self.inner.state
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.state.snapshot()
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.state.sync_state()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn pending_actions(&self) -> Vec<PendingAction> {
        self.inner.queue.borrow().actions()
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.inner.network.current_status()
    }

    /// Queues a mutation without trying the backend.
    pub fn enqueue(
        &self,
        kind: ActionKind,
        collection: Collection,
        payload: Value,
    ) -> Result<Uuid, QueueError> {
        let result = self.inner.queue.borrow_mut().enqueue(kind, collection, payload);
        self.refresh_pending();
        result
    }

    /// Applies a mutation now when possible, otherwise queues it.
    ///
    /// While older actions are still queued, new ones go behind them so the
    /// backend sees mutations in the order they were made.
    pub async fn submit(
        &self,
        kind: ActionKind,
        collection: Collection,
        payload: Value,
    ) -> Result<SubmitOutcome, QueueError> {
        let action = PendingAction::new(kind, collection, payload)?;

        if !self.inner.network.is_online() {
            let action_id = self.enqueue(kind, collection, action.payload)?;
            return Ok(SubmitOutcome::Queued { action_id });
        }

        if self.pending_count() > 0 {
            let action_id = self.enqueue(kind, collection, action.payload)?;
            self.drain().await;
            return Ok(SubmitOutcome::Queued { action_id });
        }

        match self.inner.backend.apply(collection, kind, &action.payload).await {
            Ok(response) => Ok(SubmitOutcome::Applied { response }),
            Err(e) => {
                log::warn!("⚠️ {} on {} failed, queueing: {}", kind, collection, e);
                let action_id = self.enqueue(kind, collection, action.payload)?;
                Ok(SubmitOutcome::Queued { action_id })
            }
        }
    }

    /// Replays every queued action once, FIFO.
    pub async fn drain(&self) -> DrainOutcome {
        let inner = &self.inner;

        if !inner.network.is_online() {
            log::debug!("📴 Drain skipped: offline");
            return DrainOutcome::Offline;
        }
        if inner.state.is_syncing() {
            log::info!("🔄 Drain already in progress, skipping");
            return DrainOutcome::AlreadyRunning;
        }

        let batch = inner.queue.borrow().actions();
        if batch.is_empty() {
            return DrainOutcome::Empty;
        }

        let guard = SyncingGuard::begin(&inner.state);
        log::info!("🔄 Draining {} pending actions", batch.len());

        let mut delivered = Vec::with_capacity(batch.len());
        let mut failed = 0;
        for action in &batch {
            match inner.backend.apply(action.collection, action.kind, &action.payload).await {
                Ok(_) => delivered.push(action.id),
                Err(e) => {
                    failed += 1;
                    log::warn!(
                        "⚠️ {} {} on {} kept in queue: {}",
                        action.id,
                        action.kind,
                        action.collection,
                        e
                    );
                }
            }
        }

        let now = Utc::now();
        let (remaining, persist_error) = {
            let mut queue = inner.queue.borrow_mut();
            queue.resolve(&delivered);
            queue.record_attempt(failed == 0, now);
            let persist_error = queue.persist().err().map(|e| {
                log::error!("❌ Could not persist queue after drain: {}", e);
                e.to_string()
            });
            (queue.len(), persist_error)
        };

        let report = DrainReport {
            attempted: batch.len(),
            succeeded: delivered.len(),
            failed,
            remaining,
            persist_error,
        };
        inner.state.record_drain(now, report.clone());
        inner.state.set_pending_count(remaining);
        drop(guard);

        if failed == 0 {
            log::info!("✅ Drain complete: {} delivered", report.succeeded);
        } else {
            log::warn!(
                "⚠️ Drain complete: {} delivered, {} failed, {} still pending",
                report.succeeded,
                failed,
                remaining
            );
        }
        DrainOutcome::Completed(report)
    }

    /// Periodic retry. Honors the backoff that manual and reconnect drains ignore.
    pub async fn retry_pending(&self, now: DateTime<Utc>) -> DrainOutcome {
        let remaining_seconds = {
            let queue = self.inner.queue.borrow();
            if queue.is_empty() {
                return DrainOutcome::Empty;
            }
            queue.backoff_remaining_at(now, &self.inner.retry)
        };
        if remaining_seconds > 0 {
            log::info!("⏳ Waiting for backoff: {}s left", remaining_seconds);
            return DrainOutcome::BackingOff { remaining_seconds };
        }
        self.drain().await
    }

    /// Feeds a connectivity report into the state machine. Going online drains the queue.
    pub async fn handle_network_change(&self, status: NetworkStatus) -> Option<DrainOutcome> {
        let transition = self.inner.network.update(status);
        self.inner.state.set_online(self.inner.network.is_online());

        match transition {
            Some(NetworkTransition::WentOnline) => {
                log::info!("🌐 Connection restored, draining queue");
                Some(self.drain().await)
            }
            Some(NetworkTransition::WentOffline) | None => None,
        }
    }

    fn refresh_pending(&self) {
        let count = self.inner.queue.borrow().len();
        self.inner.state.set_pending_count(count);
    }
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use std::rc::Rc;

    use gloo_timers::callback::Interval;
    use wasm_bindgen::closure::Closure;
    use wasm_bindgen::JsCast;
    use wasm_bindgen_futures::spawn_local;
    use web_sys::{window, Event};

    use super::SyncService;
    use crate::config::CONFIG;
    use crate::error::PersistenceError;
    use crate::services::api_client::ApiClient;
    use crate::services::network_monitor::{NetworkMonitor, NetworkStatus};
    use crate::services::offline_service::OfflineQueue;
    use crate::utils::storage::BrowserLocalStorage;

    impl SyncService {
        /// localStorage + REST backend + navigator.onLine, configured from `CONFIG`.
        /// Shared per page: later calls return the service built by the first.
        pub fn for_browser() -> Result<Self, PersistenceError> {
            let key = &CONFIG.queue_storage_key;
            Self::shared(key, || {
                let queue = OfflineQueue::open(Rc::new(BrowserLocalStorage), key)?;
                Ok(Self::new(
                    queue,
                    Rc::new(ApiClient::new()),
                    NetworkMonitor::from_navigator(),
                    CONFIG.retry,
                ))
            })
        }

        /// Wires window `online`/`offline` events and the periodic retry into this service.
        /// Registers once; later calls are ignored.
        pub fn start_auto_sync(&self) {
            if self.inner.auto_sync_started.replace(true) {
                log::warn!("⚠️ Auto-sync already started, ignoring");
                return;
            }
            let win = match window() {
                Some(w) => w,
                None => return,
            };

            for (event, status) in [("online", NetworkStatus::Online), ("offline", NetworkStatus::Offline)] {
                let service = self.clone();
                let closure = Closure::wrap(Box::new(move |_e: Event| {
                    let service = service.clone();
                    spawn_local(async move {
                        service.handle_network_change(status).await;
                    });
                }) as Box<dyn FnMut(Event)>);
                let _ = win.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref());
                // window listeners live as long as the app
                closure.forget();
            }

            let service = self.clone();
            let interval = Interval::new(CONFIG.retry.interval_seconds.saturating_mul(1000), move || {
                let service = service.clone();
                spawn_local(async move {
                    service.retry_pending(chrono::Utc::now()).await;
                });
            });
            interval.forget();

            // Drain anything left from a previous session
            let service = self.clone();
            spawn_local(async move {
                service.drain().await;
            });

            log::info!("🚀 Auto-sync started");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PersistenceError;
    use crate::testing::{FlakyStorage, ScriptedBackend};
    use crate::utils::storage::{KeyValueStorage, MemoryStorage};
    use chrono::Duration;
    use futures::executor::block_on;
    use futures::future::join;
    use serde_json::json;

    const KEY: &str = "sync_test_queue";

    fn service_with(
        storage: Rc<dyn KeyValueStorage>,
        status: NetworkStatus,
    ) -> (SyncService, ScriptedBackend) {
        let backend = ScriptedBackend::new();
        let queue = OfflineQueue::open(storage, KEY).unwrap();
        let service = SyncService::new(
            queue,
            Rc::new(backend.clone()),
            NetworkMonitor::new(status),
            RetryConfig::default(),
        );
        (service, backend)
    }

    fn offline_service() -> (SyncService, ScriptedBackend, MemoryStorage) {
        let storage = MemoryStorage::new();
        let (service, backend) = service_with(Rc::new(storage.clone()), NetworkStatus::Offline);
        (service, backend, storage)
    }

    fn online_service() -> (SyncService, ScriptedBackend) {
        service_with(Rc::new(MemoryStorage::new()), NetworkStatus::Online)
    }

    fn note(tag: &str) -> Value {
        json!({ "tag": tag, "body": format!("note {}", tag) })
    }

    fn queued_tags(service: &SyncService) -> Vec<String> {
        service
            .pending_actions()
            .iter()
            .map(|a| a.payload["tag"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn failed_actions_stay_in_original_order() {
        let (service, backend, storage) = offline_service();
        for tag in ["x", "y", "z"] {
            service.enqueue(ActionKind::Create, Collection::Notes, note(tag)).unwrap();
        }
        backend.fail_tag("x");
        backend.fail_tag("z");

        let outcome = block_on(service.handle_network_change(NetworkStatus::Online)).unwrap();
        let report = outcome.report().unwrap();
        assert_eq!((report.attempted, report.succeeded, report.failed, report.remaining), (3, 1, 2, 2));
        assert_eq!(backend.tags(), vec!["x", "y", "z"]);
        assert_eq!(queued_tags(&service), vec!["x", "z"]);

        let (reopened, _) = service_with(Rc::new(storage), NetworkStatus::Offline);
        assert_eq!(queued_tags(&reopened), vec!["x", "z"]);
        assert_eq!(service.sync_state(), SyncState::PendingRemainder { count: 2 });
    }

    #[test]
    fn draining_an_empty_queue_is_a_no_op() {
        let storage = MemoryStorage::new();
        let (service, backend) = service_with(Rc::new(storage.clone()), NetworkStatus::Online);
        let before = service.snapshot();

        assert_eq!(block_on(service.drain()), DrainOutcome::Empty);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(service.snapshot(), before);
        assert_eq!(service.state().last_sync_attempt(), None);
        assert_eq!(storage.raw(KEY), None);
    }

    #[test]
    fn pending_count_tracks_the_queue() {
        let (service, backend, _) = offline_service();
        assert_eq!(service.snapshot().pending_count, 0);

        service.enqueue(ActionKind::Create, Collection::Clients, note("a")).unwrap();
        assert_eq!(service.snapshot().pending_count, 1);
        service.enqueue(ActionKind::Create, Collection::Clients, note("b")).unwrap();
        assert_eq!(service.snapshot().pending_count, 2);
        assert_eq!(service.snapshot().label().as_deref(), Some("2 pending changes"));

        backend.fail_tag("b");
        block_on(service.handle_network_change(NetworkStatus::Online));
        assert_eq!(service.snapshot().pending_count, 1);
        assert_eq!(service.pending_count(), 1);

        backend.heal();
        block_on(service.drain());
        assert_eq!(service.snapshot().pending_count, 0);
        assert_eq!(service.sync_state(), SyncState::Idle);
    }

    #[test]
    fn concurrent_drains_are_coalesced() {
        let (service, backend) = online_service();
        for tag in ["a", "b", "c"] {
            service.enqueue(ActionKind::Create, Collection::Notes, note(tag)).unwrap();
        }

        let (first, second) = block_on(join(service.drain(), service.drain()));
        assert!(matches!(first, DrainOutcome::Completed(_)));
        assert_eq!(second, DrainOutcome::AlreadyRunning);
        assert_eq!(backend.call_count(), 3);
        assert!(!service.snapshot().is_syncing);
    }

    #[test]
    fn syncing_flag_is_visible_while_draining() {
        let (service, _backend) = online_service();
        service.enqueue(ActionKind::Create, Collection::Notes, note("a")).unwrap();

        let observed = Rc::new(RefCell::new(Vec::new()));
        {
            let observed = observed.clone();
            service.state().subscribe(move |s| observed.borrow_mut().push(s.state()));
        }
        block_on(service.drain());

        assert_eq!(
            *observed.borrow(),
            vec![
                SyncState::Draining { pending_count: 1 },
                SyncState::Draining { pending_count: 0 },
                SyncState::Idle,
            ]
        );
    }

    #[test]
    fn offline_drain_does_nothing() {
        let (service, backend, _) = offline_service();
        service.enqueue(ActionKind::Create, Collection::Notes, note("a")).unwrap();

        assert_eq!(block_on(service.drain()), DrainOutcome::Offline);
        assert_eq!(backend.call_count(), 0);
        assert_eq!(service.sync_state(), SyncState::Offline { pending_count: 1 });
    }

    #[test]
    fn actions_enqueued_mid_drain_are_kept() {
        let (service, backend) = online_service();
        service.enqueue(ActionKind::Create, Collection::Notes, note("a")).unwrap();

        let late = async {
            service.enqueue(ActionKind::Create, Collection::Notes, note("late")).unwrap();
        };
        let (outcome, _) = block_on(join(service.drain(), late));

        assert_eq!(outcome.report().unwrap().remaining, 1);
        assert_eq!(backend.tags(), vec!["a"]);
        assert_eq!(queued_tags(&service), vec!["late"]);
    }

    #[test]
    fn submit_goes_direct_when_online_and_queue_empty() {
        let (service, backend) = online_service();

        let outcome = block_on(service.submit(
            ActionKind::Update,
            Collection::ServiceOrders,
            json!({"id": "o-1", "status": "ready"}),
        ))
        .unwrap();

        assert_eq!(outcome, SubmitOutcome::Applied { response: json!({"id": "o-1"}) });
        assert_eq!(backend.calls()[0].0, Collection::ServiceOrders);
        assert_eq!(service.pending_count(), 0);
    }

    #[test]
    fn submit_queues_on_failure_or_offline() {
        let (service, backend) = online_service();
        backend.fail_tag("boom");

        let outcome =
            block_on(service.submit(ActionKind::Create, Collection::Notes, note("boom"))).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Queued { .. }));
        assert_eq!(service.pending_count(), 1);

        block_on(service.handle_network_change(NetworkStatus::Offline));
        let outcome = block_on(service.submit(ActionKind::Create, Collection::Notes, note("calm"))).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Queued { .. }));
        assert_eq!(backend.call_count(), 1);
        assert_eq!(queued_tags(&service), vec!["boom", "calm"]);
    }

    #[test]
    fn submit_waits_behind_older_actions() {
        let (service, backend) = online_service();
        service.enqueue(ActionKind::Create, Collection::Clients, note("old")).unwrap();

        let outcome = block_on(service.submit(ActionKind::Create, Collection::Clients, note("new"))).unwrap();
        assert!(matches!(outcome, SubmitOutcome::Queued { .. }));
        assert_eq!(backend.tags(), vec!["old", "new"]);
        assert_eq!(service.pending_count(), 0);
    }

    #[test]
    fn submit_rejects_invalid_actions() {
        let (service, backend) = online_service();
        let err = block_on(service.submit(ActionKind::Delete, Collection::Coupons, json!({}))).unwrap_err();
        assert_eq!(err, QueueError::MissingRecordId(ActionKind::Delete));
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn persist_failure_after_drain_keeps_memory_authoritative() {
        let storage = FlakyStorage::new();
        let (service, backend) = service_with(Rc::new(storage.clone()), NetworkStatus::Offline);
        service.enqueue(ActionKind::Create, Collection::Notes, note("a")).unwrap();
        service.enqueue(ActionKind::Create, Collection::Notes, note("b")).unwrap();
        backend.fail_tag("b");

        storage.reject_writes(true);
        let outcome = block_on(service.handle_network_change(NetworkStatus::Online)).unwrap();
        let report = outcome.report().unwrap();
        assert!(report.persist_error.is_some());
        assert_eq!(queued_tags(&service), vec!["b"]);
        assert_eq!(service.snapshot().pending_count, 1);

        // storage still holds both until the next successful persist
        storage.reject_writes(false);
        backend.heal();
        block_on(service.drain());
        assert_eq!(storage.inner().raw(KEY), None);
    }

    #[test]
    fn enqueue_reports_persistence_errors() {
        let storage = FlakyStorage::new();
        let (service, _) = service_with(Rc::new(storage.clone()), NetworkStatus::Offline);
        storage.reject_writes(true);

        let err = service.enqueue(ActionKind::Create, Collection::Notes, note("a")).unwrap_err();
        assert!(matches!(err, QueueError::Persistence(_)));
        assert_eq!(service.snapshot().pending_count, 0);
    }

    #[test]
    fn connectivity_cycle() {
        let (service, backend, _) = offline_service();
        service.enqueue(ActionKind::Create, Collection::Notes, note("a")).unwrap();
        assert_eq!(service.sync_state(), SyncState::Offline { pending_count: 1 });

        backend.fail_tag("a");
        block_on(service.handle_network_change(NetworkStatus::Online));
        assert_eq!(service.sync_state(), SyncState::PendingRemainder { count: 1 });

        // repeated online report is not a transition
        assert_eq!(block_on(service.handle_network_change(NetworkStatus::Online)), None);
        assert_eq!(backend.call_count(), 1);

        assert_eq!(block_on(service.handle_network_change(NetworkStatus::Offline)), None);
        assert_eq!(service.sync_state(), SyncState::Offline { pending_count: 1 });

        backend.heal();
        block_on(service.handle_network_change(NetworkStatus::Online));
        assert_eq!(service.sync_state(), SyncState::Idle);
        assert_eq!(backend.call_count(), 2);
    }

    #[test]
    fn periodic_retry_honors_backoff() {
        let (service, backend, _) = offline_service();
        service.enqueue(ActionKind::Create, Collection::Notes, note("a")).unwrap();
        backend.fail_tag("a");
        block_on(service.handle_network_change(NetworkStatus::Online));
        let failed_at = service.state().last_sync_attempt().unwrap();

        let early = block_on(service.retry_pending(failed_at + Duration::seconds(10)));
        assert!(matches!(early, DrainOutcome::BackingOff { .. }));
        assert_eq!(backend.call_count(), 1);

        // manual drain ignores the backoff
        assert!(matches!(block_on(service.drain()), DrainOutcome::Completed(_)));
        assert_eq!(backend.call_count(), 2);

        backend.heal();
        let last = service.state().last_sync_attempt().unwrap();
        let outcome = block_on(service.retry_pending(last + Duration::seconds(600)));
        assert_eq!(outcome.report().unwrap().remaining, 0);
        assert_eq!(block_on(service.retry_pending(Utc::now())), DrainOutcome::Empty);
    }

    #[test]
    fn startup_state_comes_from_persisted_queue() {
        let storage = MemoryStorage::new();
        {
            let (service, _) = service_with(Rc::new(storage.clone()), NetworkStatus::Offline);
            service.enqueue(ActionKind::Create, Collection::Notes, note("a")).unwrap();
            service.enqueue(ActionKind::Delete, Collection::Notes, json!({"id": 9, "tag": "b"})).unwrap();
        }
        let (service, backend) = service_with(Rc::new(storage), NetworkStatus::Online);
        assert_eq!(service.snapshot().pending_count, 2);
        assert_eq!(service.sync_state(), SyncState::PendingRemainder { count: 2 });

        block_on(service.drain());
        let calls = backend.calls();
        assert_eq!(calls[1].1, ActionKind::Delete);
        assert_eq!(calls[1].2["id"], 9);
    }

    #[test]
    fn handles_on_one_key_share_a_single_queue() {
        let storage = MemoryStorage::new();
        let builds = Cell::new(0);
        let open = || {
            SyncService::shared::<PersistenceError>("shared_handles_queue", || {
                builds.set(builds.get() + 1);
                Ok(service_with(Rc::new(storage.clone()), NetworkStatus::Offline).0)
            })
            .unwrap()
        };
        let first = open();
        let second = open();
        assert_eq!(builds.get(), 1);

        first.enqueue(ActionKind::Create, Collection::Notes, note("x")).unwrap();
        second.enqueue(ActionKind::Create, Collection::Notes, note("y")).unwrap();
        assert_eq!(first.pending_count(), 2);
        assert_eq!(second.snapshot().pending_count, 2);

        let (reopened, _) = service_with(Rc::new(storage), NetworkStatus::Offline);
        assert_eq!(queued_tags(&reopened), vec!["x", "y"]);
    }
}
