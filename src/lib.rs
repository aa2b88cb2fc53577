// ============================================================================
// TENISLAB CORE - route optimizer + offline action queue
// ============================================================================
// - Models: shared data structures (waypoints, pending actions, sync state)
// - Services: optimizer, geocoding, backend client, offline queue, sync
// - State: observable sync state for the presentation layer
// - Utils: storage collaborators and constants
// Builds natively (tests, non-browser hosts) and for wasm32 (staff PWA).
// ============================================================================

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

#[cfg(target_arch = "wasm32")]
pub mod bindings;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, RetryConfig, CONFIG};
pub use error::{GeocodingError, MutationError, OptimizeError, PersistenceError, QueueError};
pub use models::{
    ActionKind, Collection, DrainOutcome, DrainReport, GeoPoint, LocationRef, OptimizeRouteRequest,
    OptimizeRouteResponse, PendingAction, SubmitOutcome, SyncSnapshot, SyncState, Waypoint,
};
pub use services::{optimize_route, Geocoder, MutationBackend, OfflineQueue, SyncService};
pub use state::SyncStateWrapper;
pub use utils::storage::{KeyValueStorage, MemoryStorage};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
    if CONFIG.is_logging_enabled() {
        let level = if CONFIG.is_production() {
            log::Level::Info
        } else {
            log::Level::Debug
        };
        wasm_logger::init(wasm_logger::Config::new(level));
    }
    log::info!("🚀 TENISLAB core loaded ({})", CONFIG.environment);
}
