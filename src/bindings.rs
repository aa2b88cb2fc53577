// ============================================================================
// JS BINDINGS - what the staff PWA calls
// ============================================================================

use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::models::pending_action::{ActionKind, Collection};
use crate::models::route::OptimizeRouteRequest;
use crate::services::{optimize_route, HttpGeocoder, SyncService};

fn to_js<E: std::fmt::Display>(e: E) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_json::to_string(value).map(|s| JsValue::from_str(&s)).map_err(to_js)
}

fn parse_action(kind: &str, collection: &str, payload_json: &str) -> Result<(ActionKind, Collection, Value), JsValue> {
    let kind = kind.parse::<ActionKind>().map_err(to_js)?;
    let collection = collection.parse::<Collection>().map_err(to_js)?;
    let payload = serde_json::from_str::<Value>(payload_json).map_err(to_js)?;
    Ok((kind, collection, payload))
}

/// `{"waypoints": [{id, location}], "start"?: {lat, lng}}` -> `{"optimizedOrder": [...], ...}`
#[wasm_bindgen(js_name = optimizeRoute)]
pub async fn optimize_route_json(request_json: String) -> Result<String, JsValue> {
    let request: OptimizeRouteRequest = serde_json::from_str(&request_json).map_err(to_js)?;
    let response = optimize_route(&HttpGeocoder::new(), &request).await.map_err(to_js)?;
    if let Some(summary) = response.summary() {
        log::warn!("📍 {}", summary);
    }
    serde_json::to_string(&response).map_err(to_js)
}

#[wasm_bindgen]
pub struct OfflineSync {
    service: SyncService,
}

#[wasm_bindgen]
impl OfflineSync {
    /// Opens the persisted queue and starts listening to connectivity changes.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<OfflineSync, JsValue> {
        let service = SyncService::for_browser().map_err(to_js)?;
        service.start_auto_sync();
        Ok(OfflineSync { service })
    }

    /// Returns the id of the queued action.
    pub fn enqueue(&self, kind: &str, collection: &str, payload_json: &str) -> Result<String, JsValue> {
        let (kind, collection, payload) = parse_action(kind, collection, payload_json)?;
        self.service
            .enqueue(kind, collection, payload)
            .map(|id| id.to_string())
            .map_err(to_js)
    }

    pub fn submit(&self, kind: &str, collection: &str, payload_json: &str) -> js_sys::Promise {
        let parsed = parse_action(kind, collection, payload_json);
        let service = self.service.clone();
        future_to_promise(async move {
            let (kind, collection, payload) = parsed?;
            let outcome = service.submit(kind, collection, payload).await.map_err(to_js)?;
            to_json(&outcome)
        })
    }

    pub fn drain(&self) -> js_sys::Promise {
        let service = self.service.clone();
        future_to_promise(async move { to_json(&service.drain().await) })
    }

    /// `{"isOnline", "isSyncing", "pendingCount"}`
    pub fn snapshot(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.service.snapshot()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = pendingCount)]
    pub fn pending_count(&self) -> usize {
        self.service.pending_count()
    }

    /// "3 pending changes", or undefined.
    #[wasm_bindgen(js_name = pendingLabel)]
    pub fn pending_label(&self) -> Option<String> {
        self.service.snapshot().label()
    }
}
