use serde::{Deserialize, Serialize};

/// Geographic coordinate, WGS84 decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<(f64, f64)> for GeoPoint {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// Where a waypoint is: either already a coordinate or an address to geocode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationRef {
    Coordinates(GeoPoint),
    Address(String),
}

impl From<GeoPoint> for LocationRef {
    fn from(point: GeoPoint) -> Self {
        LocationRef::Coordinates(point)
    }
}

impl From<&str> for LocationRef {
    fn from(address: &str) -> Self {
        LocationRef::Address(address.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub location: LocationRef,
}

impl Waypoint {
    pub fn new(id: impl Into<String>, location: impl Into<LocationRef>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteRequest {
    pub waypoints: Vec<Waypoint>,
    /// Depot / service location. When absent the tour starts at the first resolved waypoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<GeoPoint>,
}

impl OptimizeRouteRequest {
    pub fn new(waypoints: Vec<Waypoint>) -> Self {
        Self {
            waypoints,
            start: None,
        }
    }

    pub fn starting_at(mut self, start: GeoPoint) -> Self {
        self.start = Some(start);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteResponse {
    pub optimized_order: Vec<String>,
    #[serde(default)]
    pub dropped: Vec<String>,
    pub total_distance_km: f64,
}

impl OptimizeRouteResponse {
    /// Number of stops the caller asked for.
    pub fn requested(&self) -> usize {
        self.optimized_order.len() + self.dropped.len()
    }

    /// Aggregate message for the presentation layer, `None` when every stop was routed.
    pub fn summary(&self) -> Option<String> {
        if self.dropped.is_empty() {
            return None;
        }
        let noun = if self.requested() == 1 { "stop" } else { "stops" };
        Some(format!(
            "could not route {} of {} {}",
            self.dropped.len(),
            self.requested(),
            noun
        ))
    }
}
