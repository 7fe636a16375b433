//! Great-circle helpers on WGS84 coordinates.
//!
//! Nearest-point queries are **vertex-only**: they measure against route
//! waypoints, not against the segments between them. Provider polylines are
//! dense enough for the deviation threshold, but between sparse waypoints
//! the reported distance over-estimates the true cross-track distance.

use epanav_env::GeoPoint;

/// Earth radius in meters used for all haversine math.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two points in meters.
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let dlat = (b.latitude() - a.latitude()).to_radians();
    let dlon = (b.longitude() - a.longitude()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_M * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Initial bearing from `from` toward `to`, in [0, 360).
///
/// The result is meaningless when the points coincide; callers must guard.
pub fn bearing_degrees(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude().to_radians();
    let lat2 = to.latitude().to_radians();
    let dlon = (to.longitude() - from.longitude()).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    let deg = y.atan2(x).to_degrees().rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative angles
    if deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

/// Distance to the closest route vertex. `f64::INFINITY` for an empty route.
pub fn nearest_point_distance(point: GeoPoint, route: &[GeoPoint]) -> f64 {
    route
        .iter()
        .map(|&r| distance_meters(point, r))
        .fold(f64::INFINITY, f64::min)
}

/// Index of the closest route vertex (first one on ties).
pub fn nearest_point_index(point: GeoPoint, route: &[GeoPoint]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;

    for (i, &r) in route.iter().enumerate() {
        let d = distance_meters(point, r);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }

    best.map(|(i, _)| i)
}

/// The waypoint after the closest vertex, clamped to the last waypoint.
///
/// Returns `None` for routes with fewer than two waypoints.
pub fn next_waypoint(point: GeoPoint, route: &[GeoPoint]) -> Option<GeoPoint> {
    if route.len() < 2 {
        return None;
    }

    let closest = nearest_point_index(point, route)?;
    let next = (closest + 1).min(route.len() - 1);
    Some(route[next])
}

/// Total length of a polyline in meters.
pub fn route_length_meters(route: &[GeoPoint]) -> f64 {
    route
        .windows(2)
        .map(|w| distance_meters(w[0], w[1]))
        .sum()
}
