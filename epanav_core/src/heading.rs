//! Facing direction for the position marker.

use epanav_env::GeoPoint;
use serde::Serialize;

use crate::geo_math::{bearing_degrees, distance_meters, next_waypoint};
use crate::route::RouteModel;

/// Points closer than this are treated as the same place.
const COINCIDENT_M: f64 = 0.001;

/// Compass heading toward the next route waypoint.
///
/// The last known value persists whenever a new one cannot be computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HeadingTracker {
    bearing_degrees: f64,
}

impl HeadingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current heading in [0, 360).
    pub fn heading(&self) -> f64 {
        self.bearing_degrees
    }

    /// Recomputes the heading for `point` on `route`.
    ///
    /// Returns true if the heading changed.
    pub fn update(&mut self, point: GeoPoint, route: &RouteModel) -> bool {
        let Some(next) = next_waypoint(point, route.waypoints()) else {
            return false;
        };
        if distance_meters(point, next) < COINCIDENT_M {
            return false;
        }

        let bearing = bearing_degrees(point, next);
        let changed = bearing != self.bearing_degrees;
        self.bearing_degrees = bearing;
        changed
    }
}
