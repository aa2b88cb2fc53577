// ============================================================================
// GEOCODING - address -> coordinate, one lookup per waypoint
// ============================================================================

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;

use crate::error::GeocodingError;
use crate::models::route::{GeoPoint, LocationRef, Waypoint};

/// External geocoding collaborator: zero or one coordinate per query.
#[async_trait(?Send)]
pub trait Geocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodingError>;
}

/// Outcome of resolving a whole batch of waypoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeBatch {
    /// Resolved waypoints, input order.
    pub resolved: Vec<(String, GeoPoint)>,
    /// Ids that could not be resolved, input order.
    pub dropped: Vec<String>,
    /// Number of waypoints that needed a geocoder lookup.
    pub lookups: usize,
    /// Lookups that failed because the service was unreachable.
    pub unavailable: usize,
}

impl GeocodeBatch {
    /// Every lookup attempted failed with the service unreachable.
    pub fn service_unreachable(&self) -> bool {
        self.lookups > 0 && self.unavailable == self.lookups
    }
}

/// Resolves every waypoint concurrently. Failures drop the waypoint and never cancel siblings.
pub async fn resolve_waypoints(geocoder: &dyn Geocoder, waypoints: &[Waypoint]) -> GeocodeBatch {
    let attempts = join_all(waypoints.iter().map(|w| resolve_one(geocoder, w))).await;

    let mut batch = GeocodeBatch::default();
    for (waypoint, (looked_up, result)) in waypoints.iter().zip(attempts) {
        if looked_up {
            batch.lookups += 1;
        }
        match result {
            Ok(point) => batch.resolved.push((waypoint.id.clone(), point)),
            Err(e) => {
                log::warn!("📍 Waypoint {} dropped: {}", waypoint.id, e);
                if e.is_unavailable() {
                    batch.unavailable += 1;
                }
                batch.dropped.push(waypoint.id.clone());
            }
        }
    }
    batch
}

/// Returns whether the geocoder was called, and the result.
async fn resolve_one(
    geocoder: &dyn Geocoder,
    waypoint: &Waypoint,
) -> (bool, Result<GeoPoint, GeocodingError>) {
    match &waypoint.location {
        LocationRef::Coordinates(point) if point.is_valid() => (false, Ok(*point)),
        LocationRef::Coordinates(point) => (
            false,
            Err(GeocodingError::InvalidResponse(format!(
                "coordinates out of range: {}, {}",
                point.lat, point.lng
            ))),
        ),
        LocationRef::Address(address) if address.trim().is_empty() => (false, Err(GeocodingError::NoResult)),
        LocationRef::Address(address) => {
            let result = match geocoder.geocode(address.trim()).await {
                Ok(Some(point)) if point.is_valid() => Ok(point),
                Ok(Some(point)) => Err(GeocodingError::InvalidResponse(format!(
                    "coordinates out of range: {}, {}",
                    point.lat, point.lng
                ))),
                Ok(None) => Err(GeocodingError::NoResult),
                Err(e) => Err(e),
            };
            (true, result)
        }
    }
}

/// One entry of a Nominatim `/search?format=json` answer. Coordinates come back as strings.
#[derive(Debug, Deserialize)]
pub struct NominatimHit {
    pub lat: String,
    pub lon: String,
}

pub fn parse_nominatim(hits: &[NominatimHit]) -> Result<Option<GeoPoint>, GeocodingError> {
    let hit = match hits.first() {
        Some(hit) => hit,
        None => return Ok(None),
    };
    let lat = hit
        .lat
        .parse::<f64>()
        .map_err(|e| GeocodingError::InvalidResponse(format!("lat '{}': {}", hit.lat, e)))?;
    let lng = hit
        .lon
        .parse::<f64>()
        .map_err(|e| GeocodingError::InvalidResponse(format!("lon '{}': {}", hit.lon, e)))?;
    Ok(Some(GeoPoint::new(lat, lng)))
}

#[cfg(target_arch = "wasm32")]
pub use http::HttpGeocoder;

#[cfg(target_arch = "wasm32")]
mod http {
    use async_trait::async_trait;
    use gloo_net::http::Request;

    use super::{parse_nominatim, Geocoder, NominatimHit};
    use crate::config::CONFIG;
    use crate::error::GeocodingError;
    use crate::models::route::GeoPoint;
    use crate::services::api_client::encode_query_value;

    /// Nominatim-compatible HTTP geocoder.
    #[derive(Clone)]
    pub struct HttpGeocoder {
        base_url: String,
    }

    impl HttpGeocoder {
        pub fn new() -> Self {
            Self::with_base_url(&CONFIG.geocoder_url)
        }

        pub fn with_base_url(base_url: &str) -> Self {
            Self {
                base_url: base_url.trim_end_matches('/').to_string(),
            }
        }
    }

    impl Default for HttpGeocoder {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait(?Send)]
    impl Geocoder for HttpGeocoder {
        async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodingError> {
            let url = format!(
                "{}/search?format=json&limit=1&q={}",
                self.base_url,
                encode_query_value(query)
            );

            let response = Request::get(&url)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| GeocodingError::Unavailable(e.to_string()))?;

            let status = response.status();
            if status == 429 || status >= 500 {
                return Err(GeocodingError::Unavailable(format!("HTTP {}", status)));
            }
            if !response.ok() {
                return Err(GeocodingError::InvalidResponse(format!("HTTP {}", status)));
            }

            let hits = response
                .json::<Vec<NominatimHit>>()
                .await
                .map_err(|e| GeocodingError::InvalidResponse(e.to_string()))?;
            parse_nominatim(&hits)
        }
    }
}
