//! In-memory collaborators for the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{GeocodingError, MutationError, PersistenceError};
use crate::models::pending_action::{record_id, ActionKind, Collection};
use crate::models::route::GeoPoint;
use crate::services::api_client::MutationBackend;
use crate::services::geocoding_service::Geocoder;
use crate::utils::storage::{KeyValueStorage, MemoryStorage};

#[derive(Default)]
pub struct StaticGeocoder {
    known: HashMap<String, GeoPoint>,
    unavailable: HashSet<String>,
    all_unavailable: bool,
    calls: Cell<usize>,
    events: RefCell<Vec<String>>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, point: GeoPoint) -> Self {
        self.known.insert(query.to_string(), point);
        self
    }

    pub fn unavailable(mut self, query: &str) -> Self {
        self.unavailable.insert(query.to_string());
        self
    }

    pub fn all_unavailable(mut self) -> Self {
        self.all_unavailable = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    /// `start:<query>` / `end:<query>` in the order lookups began and settled.
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

#[async_trait(?Send)]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodingError> {
        self.calls.set(self.calls.get() + 1);
        self.events.borrow_mut().push(format!("start:{}", query));
        YieldNow::default().await;
        self.events.borrow_mut().push(format!("end:{}", query));
        if self.all_unavailable || self.unavailable.contains(query) {
            return Err(GeocodingError::Unavailable("connection refused".into()));
        }
        Ok(self.known.get(query).copied())
    }
}

/// Backend double: records every call and fails payloads whose `tag` is listed.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    calls: Rc<RefCell<Vec<(Collection, ActionKind, Value)>>>,
    failing_tags: Rc<RefCell<HashSet<String>>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_tag(&self, tag: &str) {
        self.failing_tags.borrow_mut().insert(tag.to_string());
    }

    pub fn heal(&self) {
        self.failing_tags.borrow_mut().clear();
    }

    pub fn calls(&self) -> Vec<(Collection, ActionKind, Value)> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// `tag` of every payload sent, in call order.
    pub fn tags(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|(_, _, p)| p.get("tag").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

#[async_trait(?Send)]
impl MutationBackend for ScriptedBackend {
    async fn apply(
        &self,
        collection: Collection,
        kind: ActionKind,
        payload: &Value,
    ) -> Result<Value, MutationError> {
        self.calls.borrow_mut().push((collection, kind, payload.clone()));
        YieldNow::default().await;

        let tag = payload.get("tag").and_then(Value::as_str).unwrap_or_default();
        if self.failing_tags.borrow().contains(tag) {
            return Err(MutationError::Rejected {
                status: 503,
                message: format!("{} unavailable", tag),
            });
        }
        Ok(json!({ "id": record_id(payload).unwrap_or_else(|| "new".into()) }))
    }
}

/// Storage whose writes can be switched off to simulate a full quota.
#[derive(Clone, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    reject_writes: Rc<Cell<bool>>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }
}

impl KeyValueStorage for FlakyStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        if self.reject_writes.get() {
            return Err(PersistenceError::Write {
                key: key.to_string(),
                reason: "QuotaExceededError".into(),
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.inner.remove(key)
    }
}

/// Suspends once, so concurrent futures get a chance to interleave.
#[derive(Default)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
