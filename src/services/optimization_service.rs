// ============================================================================
// ROUTE OPTIMIZER - nearest neighbor over Haversine distance
// ============================================================================
// Greedy single pass, O(n²). Good enough for delivery batches of a few tens
// of stops; it does not guarantee the shortest tour. Callers that need better
// tours should run a local search (2-opt) over the returned order.
// ============================================================================

use std::collections::HashSet;

use crate::error::OptimizeError;
use crate::models::route::{GeoPoint, OptimizeRouteRequest, OptimizeRouteResponse};
use crate::services::geocoding_service::{resolve_waypoints, Geocoder};
use crate::utils::constants::EARTH_RADIUS_KM;

/// Great-circle distance in kilometers.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let s1 = (dlat / 2.0).sin();
    let s2 = (dlng / 2.0).sin();
    let h = (s1 * s1 + lat1.cos() * lat2.cos() * s2 * s2).min(1.0);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Visiting order as indices into `points`.
///
/// With `start` the tour leaves from that coordinate and every point is a
/// candidate; without it the tour begins at `points[0]`. Ties go to the point
/// that comes first in `points`.
pub fn nearest_neighbor_order(points: &[GeoPoint], start: Option<&GeoPoint>) -> Vec<usize> {
    let mut remaining: Vec<usize> = (0..points.len()).collect();
    let mut order = Vec::with_capacity(points.len());

    let mut current = match start {
        Some(start) => *start,
        None => {
            if remaining.is_empty() {
                return order;
            }
            let first = remaining.remove(0);
            order.push(first);
            points[first]
        }
    };

    while !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_dist = f64::INFINITY;
        for (pos, &idx) in remaining.iter().enumerate() {
            let dist = haversine_km(&current, &points[idx]);
            if dist < best_dist {
                best_dist = dist;
                best_pos = pos;
            }
        }
        // remove (not swap_remove) keeps input order for tie-breaking
        let next = remaining.remove(best_pos);
        order.push(next);
        current = points[next];
    }

    order
}

/// Open-path length of visiting `points` in `order`, from `start` if given.
pub fn route_distance_km(points: &[GeoPoint], order: &[usize], start: Option<&GeoPoint>) -> f64 {
    let mut path: Vec<&GeoPoint> = Vec::with_capacity(order.len() + 1);
    if let Some(start) = start {
        path.push(start);
    }
    path.extend(order.iter().map(|&i| &points[i]));
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

/// Geocodes the waypoints and orders them by nearest neighbor.
pub async fn optimize_route(
    geocoder: &dyn Geocoder,
    request: &OptimizeRouteRequest,
) -> Result<OptimizeRouteResponse, OptimizeError> {
    let waypoints = &request.waypoints;
    if waypoints.len() < 2 {
        return Err(OptimizeError::InsufficientInput {
            resolved: waypoints.len(),
        });
    }

    let mut seen = HashSet::with_capacity(waypoints.len());
    if let Some(dup) = waypoints.iter().find(|w| !seen.insert(w.id.as_str())) {
        return Err(OptimizeError::DuplicateWaypoint(dup.id.clone()));
    }

    log::info!("🎯 Optimizing route over {} waypoints", waypoints.len());

    let batch = resolve_waypoints(geocoder, waypoints).await;
    if batch.resolved.len() < 2 {
        if batch.service_unreachable() {
            log::error!("❌ Geocoding unavailable for all {} lookups", batch.lookups);
            return Err(OptimizeError::GeocodingUnavailable);
        }
        return Err(OptimizeError::InsufficientInput {
            resolved: batch.resolved.len(),
        });
    }

    let (ids, points): (Vec<String>, Vec<GeoPoint>) = batch.resolved.into_iter().unzip();
    let start = request.start.as_ref().filter(|p| p.is_valid());
    if request.start.is_some() && start.is_none() {
        log::warn!("⚠️ Ignoring out-of-range start point");
    }

    let order = nearest_neighbor_order(&points, start);
    let total_distance_km = route_distance_km(&points, &order, start);

    log::info!(
        "✅ Route optimized: {} stops, {} dropped, {:.2} km",
        order.len(),
        batch.dropped.len(),
        total_distance_km
    );

    Ok(OptimizeRouteResponse {
        optimized_order: order.into_iter().map(|i| ids[i].clone()).collect(),
        dropped: batch.dropped,
        total_distance_km,
    })
}
