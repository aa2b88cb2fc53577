pub mod api_client;
pub mod geocoding_service;
pub mod network_monitor;
pub mod offline_service;
pub mod optimization_service;
pub mod sync_service;

pub use api_client::MutationBackend;
pub use geocoding_service::{resolve_waypoints, GeocodeBatch, Geocoder};
pub use network_monitor::{NetworkMonitor, NetworkStatus, NetworkTransition};
pub use offline_service::OfflineQueue;
pub use optimization_service::{haversine_km, nearest_neighbor_order, optimize_route, route_distance_km};
pub use sync_service::SyncService;

#[cfg(target_arch = "wasm32")]
pub use api_client::ApiClient;
#[cfg(target_arch = "wasm32")]
pub use geocoding_service::HttpGeocoder;
