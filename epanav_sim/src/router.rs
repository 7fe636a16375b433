//! Scripted routing provider and geocoder.
//!
//! Routes are straight lines between the endpoints, densified so that the
//! nearest-vertex distance tracks the true off-route distance. Answers go
//! through the same JSON shape the real provider returns.

use async_trait::async_trait;
use epanav_core::geo_math::{distance_meters, route_length_meters};
use epanav_core::polyline;
use epanav_env::{
    DirectionsRequest, DirectionsResponse, EnvError, GeoPoint, Geocoder, NavContext,
    RoutePreference, RoutingProvider,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::context::SimContext;

#[derive(Debug, Default)]
struct RouterFaults {
    fail_next: u32,
    empty_next: u32,
}

/// Routing provider with scripted faults and call counting.
pub struct ScriptedRouter {
    context: Arc<SimContext>,

    /// Spacing between generated waypoints in meters
    spacing_m: f64,

    /// Virtual time each request takes
    latency: Duration,

    /// Speed used for the reported duration, m/s
    reported_speed_mps: f64,

    faults: Mutex<RouterFaults>,
    calls: AtomicU64,
}

impl ScriptedRouter {
    pub fn new(context: Arc<SimContext>) -> Self {
        Self {
            context,
            spacing_m: 15.0,
            latency: Duration::from_millis(400),
            reported_speed_mps: 8.0,
            faults: Mutex::new(RouterFaults::default()),
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_spacing(mut self, meters: f64) -> Self {
        self.spacing_m = meters;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fails the next `n` requests with a provider error.
    pub fn fail_next(&self, n: u32) {
        self.faults().fail_next = n;
    }

    /// Answers the next `n` requests with an empty `routes` array.
    pub fn empty_next(&self, n: u32) {
        self.faults().empty_next = n;
    }

    /// Requests received so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn faults(&self) -> MutexGuard<'_, RouterFaults> {
        match self.faults.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn answer(&self, from: GeoPoint, to: GeoPoint) -> Result<String, EnvError> {
        let waypoints = densify(from, to, self.spacing_m)?;
        let distance = route_length_meters(&waypoints);
        let duration = distance / self.reported_speed_mps;

        let body = serde_json::json!({
            "routes": [{
                "geometry": polyline::encode(&waypoints),
                "summary": { "distance": distance, "duration": duration },
                "segments": [{ "distance": distance, "duration": duration }],
            }]
        });
        Ok(body.to_string())
    }
}

#[async_trait]
impl RoutingProvider for ScriptedRouter {
    async fn compute_route(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        preference: RoutePreference,
    ) -> Result<DirectionsResponse, EnvError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let request = DirectionsRequest::new(from, to, preference);
        debug!("Directions request #{}: {}", call, request.to_json()?);

        if !self.latency.is_zero() {
            self.context.sleep(self.latency).await;
        }

        {
            let mut faults = self.faults();
            if faults.fail_next > 0 {
                faults.fail_next -= 1;
                return Err(EnvError::provider("503 Service Unavailable (scripted)"));
            }
            if faults.empty_next > 0 {
                faults.empty_next -= 1;
                return DirectionsResponse::from_json(r#"{"routes":[]}"#);
            }
        }

        DirectionsResponse::from_json(&self.answer(from, to)?)
    }
}

/// Straight line from `from` to `to` with at most `spacing_m` between points.
pub fn densify(from: GeoPoint, to: GeoPoint, spacing_m: f64) -> Result<Vec<GeoPoint>, EnvError> {
    let length = distance_meters(from, to);
    let steps = if spacing_m > 0.0 {
        ((length / spacing_m).ceil() as usize).max(1)
    } else {
        1
    };

    (0..=steps)
        .map(|i| lerp(from, to, i as f64 / steps as f64))
        .collect()
}

/// Linear interpolation in degrees; adequate for city-scale spans.
pub fn lerp(a: GeoPoint, b: GeoPoint, fraction: f64) -> Result<GeoPoint, EnvError> {
    GeoPoint::new(
        a.latitude() + (b.latitude() - a.latitude()) * fraction,
        a.longitude() + (b.longitude() - a.longitude()) * fraction,
    )
}

/// Address-book geocoder.
#[derive(Default)]
pub struct SimGeocoder {
    book: HashMap<String, GeoPoint>,
    offline: AtomicBool,
}

impl SimGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an address (case-insensitive).
    pub fn with(mut self, address: &str, point: GeoPoint) -> Self {
        self.book.insert(normalize(address), point);
        self
    }

    /// Makes every lookup fail with a transport error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

#[async_trait]
impl Geocoder for SimGeocoder {
    async fn resolve(&self, address: &str) -> Result<Option<GeoPoint>, EnvError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(EnvError::transport("geocoder unreachable"));
        }
        Ok(self.book.get(&normalize(address)).copied())
    }
}
