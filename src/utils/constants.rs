/// Backend base URL used when none is configured at build time.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:54321";

/// Nominatim-compatible geocoder.
pub const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// localStorage key holding the serialized pending-action queue.
pub const QUEUE_STORAGE_KEY: &str = "tenislab_pending_actions";

pub const EARTH_RADIUS_KM: f64 = 6371.0;

// Backoff: 30s, 60s, 120s, 240s, max 300s
pub const DEFAULT_RETRY_BASE_SECONDS: i64 = 30;
pub const DEFAULT_RETRY_MAX_SECONDS: i64 = 300;
pub const DEFAULT_RETRY_INTERVAL_SECONDS: u32 = 60;
