//! Immutable route snapshots built from provider responses.

use epanav_env::{DirectionsResponse, GeoPoint, ProviderRoute, RouteLegSummary};
use geo::{BoundingRect, Coord, LineString, Rect};
use serde::Serialize;
use std::time::Duration;

use crate::error::NavError;
use crate::polyline;

/// An immutable route.
///
/// A reroute never mutates a `RouteModel`; it builds a new one and the
/// session swaps the shared `Arc`. Zero waypoints means "no active route";
/// otherwise there are always at least two.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteModel {
    waypoints: Vec<GeoPoint>,

    /// Route length in meters
    distance_meters: f64,

    /// Travel time at the configured vehicle speed
    estimated_duration_seconds: f64,

    /// Travel time as reported by the provider, if present
    provider_duration_seconds: Option<f64>,

    /// Monotonic creation time (context clock)
    #[serde(skip)]
    created_at: Duration,

    /// Increases with every replacement within a session
    revision: u64,
}

impl RouteModel {
    /// The "no active route" value.
    pub fn empty() -> Self {
        Self {
            waypoints: Vec::new(),
            distance_meters: 0.0,
            estimated_duration_seconds: 0.0,
            provider_duration_seconds: None,
            created_at: Duration::ZERO,
            revision: 0,
        }
    }

    /// Creates a route from decoded waypoints.
    pub fn new(
        waypoints: Vec<GeoPoint>,
        distance_meters: f64,
        vehicle_speed_kmh: f64,
        created_at: Duration,
    ) -> Result<Self, NavError> {
        if waypoints.len() < 2 {
            return Err(NavError::route_unavailable(format!(
                "route geometry has {} waypoint(s), need at least 2",
                waypoints.len()
            )));
        }
        if !distance_meters.is_finite() || distance_meters < 0.0 {
            return Err(NavError::route_unavailable(format!(
                "invalid route distance {distance_meters}"
            )));
        }

        Ok(Self {
            waypoints,
            distance_meters,
            estimated_duration_seconds: epa_duration_seconds(distance_meters, vehicle_speed_kmh),
            provider_duration_seconds: None,
            created_at,
            revision: 0,
        })
    }

    /// Builds a route from the provider's first candidate.
    ///
    /// Distance is taken from the route summary, then from the first
    /// segment, and defaults to 0. A zero figure counts as missing.
    pub fn from_response(
        response: &DirectionsResponse,
        vehicle_speed_kmh: f64,
        created_at: Duration,
    ) -> Result<Self, NavError> {
        let candidate = response
            .primary()
            .ok_or_else(|| NavError::route_unavailable("provider returned no routes"))?;

        let waypoints = polyline::decode(&candidate.geometry)
            .map_err(|e| NavError::route_unavailable(format!("invalid route geometry: {e}")))?;
        let distance = leg_figure(candidate, |leg| leg.distance).unwrap_or(0.0);

        let mut route = Self::new(waypoints, distance, vehicle_speed_kmh, created_at)?;
        route.provider_duration_seconds = leg_figure(candidate, |leg| leg.duration);
        Ok(route)
    }

    /// Stamps the session revision.
    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    pub fn waypoints(&self) -> &[GeoPoint] {
        &self.waypoints
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn estimated_duration_seconds(&self) -> f64 {
        self.estimated_duration_seconds
    }

    pub fn provider_duration_seconds(&self) -> Option<f64> {
        self.provider_duration_seconds
    }

    pub fn created_at(&self) -> Duration {
        self.created_at
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Rounded travel time in minutes, as shown in the HUD.
    pub fn duration_minutes(&self) -> u64 {
        (self.estimated_duration_seconds / 60.0).round() as u64
    }

    /// The route as a `geo` line string (x = longitude, y = latitude).
    pub fn to_line_string(&self) -> LineString<f64> {
        self.waypoints
            .iter()
            .map(|p| Coord {
                x: p.longitude(),
                y: p.latitude(),
            })
            .collect()
    }

    /// Bounding box of the route, `None` when empty.
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.to_line_string().bounding_rect()
    }
}

impl Default for RouteModel {
    fn default() -> Self {
        Self::empty()
    }
}

fn leg_figure(route: &ProviderRoute, pick: impl Fn(&RouteLegSummary) -> Option<f64>) -> Option<f64> {
    let usable = |v: f64| v.is_finite() && v > 0.0;

    route
        .summary
        .as_ref()
        .and_then(&pick)
        .filter(|&v| usable(v))
        .or_else(|| route.segments.first().and_then(&pick).filter(|&v| usable(v)))
}

/// Travel time in seconds at a constant speed.
pub fn epa_duration_seconds(distance_meters: f64, speed_kmh: f64) -> f64 {
    if speed_kmh <= 0.0 {
        return 0.0;
    }
    distance_meters / (speed_kmh / 3.6)
}

/// Travel time in whole minutes: `round(km / speed * 60)`.
pub fn epa_duration_minutes(distance_meters: f64, speed_kmh: f64) -> u64 {
    if speed_kmh <= 0.0 {
        return 0;
    }
    (distance_meters / 1000.0 / speed_kmh * 60.0).round() as u64
}
