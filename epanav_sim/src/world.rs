//! SimWorld - The simulation harness container.

use epanav_core::{CameraController, NavigationConfig, NavigationSession};
use epanav_env::{EnvError, GeoPoint, NavContext};
use geo::Rect;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::context::SimContext;
use crate::location::{SimLocation, SimLocationController};
use crate::oracle::offset_meters;
use crate::router::{ScriptedRouter, SimGeocoder};

/// Address of the trip origin in the simulated address book.
pub const DEPOT_ADDRESS: &str = "Depot, Slussen";

/// Address of the trip destination, 2 km north of the depot.
pub const HARBOUR_ADDRESS: &str = "Harbour, Norra Djurgården";

/// The session type every scenario drives.
pub type SimSession = NavigationSession<SimContext, SimLocation, ScriptedRouter>;

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Interval between live GPS fixes
    pub fix_interval_ms: u64,

    /// GPS noise standard deviation per axis (meters)
    pub gps_noise_std_m: f64,

    /// Maximum simulated drive time in seconds
    pub max_duration_secs: f64,

    /// Speed of the simulated vehicle
    pub vehicle_speed_kmh: f64,

    /// Virtual time each routing request takes
    pub router_latency_ms: u64,

    /// Waypoint spacing of generated routes (meters)
    pub route_spacing_m: f64,

    /// Engine configuration under test
    pub navigation: NavigationConfig,
}

impl SimConfig {
    pub fn fix_interval(&self) -> Duration {
        Duration::from_millis(self.fix_interval_ms)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs_f64(self.max_duration_secs.max(0.0))
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            fix_interval_ms: 1_000,
            gps_noise_std_m: 0.0,
            max_duration_secs: 300.0,
            vehicle_speed_kmh: 30.0,
            router_latency_ms: 400,
            route_spacing_m: 15.0,
            navigation: NavigationConfig::default(),
        }
    }
}

/// Camera commands received during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CameraStats {
    pub heading_updates: u64,
    pub follows: u64,
    pub fits: u64,
    pub last_heading: Option<f64>,
}

/// Camera that counts the commands it receives.
#[derive(Clone, Default)]
pub struct SimCamera {
    stats: Arc<Mutex<CameraStats>>,
}

impl SimCamera {
    pub fn stats(&self) -> CameraStats {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, CameraStats> {
        match self.stats.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl CameraController for SimCamera {
    fn set_heading(&mut self, degrees: f64) {
        let mut stats = self.lock();
        stats.heading_updates += 1;
        stats.last_heading = Some(degrees);
    }

    fn follow(&mut self, _point: GeoPoint) {
        self.lock().follows += 1;
    }

    fn fit_bounds(&mut self, _bounds: Rect<f64>) {
        self.lock().fits += 1;
    }
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Moves the simulated device and injects location faults
    pub location: SimLocationController,

    /// Routing provider shared with the session
    pub router: Arc<ScriptedRouter>,

    pub geocoder: SimGeocoder,

    pub camera: SimCamera,

    /// Engine under test
    pub session: SimSession,

    pub depot: GeoPoint,

    pub harbour: GeoPoint,

    /// Fix ticks executed
    tick_count: u64,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Result<Self, EnvError> {
        let context = SimContext::shared(config.seed);
        let (capability, location) = SimLocation::new();

        let router = Arc::new(
            ScriptedRouter::new(Arc::clone(&context))
                .with_spacing(config.route_spacing_m)
                .with_latency(Duration::from_millis(config.router_latency_ms)),
        );

        let depot = GeoPoint::new(59.3200, 18.0720)?;
        let harbour = offset_meters(depot, 2_000.0, 0.0);
        let geocoder = SimGeocoder::new()
            .with(DEPOT_ADDRESS, depot)
            .with(HARBOUR_ADDRESS, harbour);

        let camera = SimCamera::default();
        let session = NavigationSession::new(
            Arc::clone(&context),
            Arc::new(capability),
            Arc::clone(&router),
            config.navigation.clone(),
        )
        .with_camera(Box::new(camera.clone()));

        Ok(Self {
            config,
            context,
            location,
            router,
            geocoder,
            camera,
            session,
            depot,
            harbour,
            tick_count: 0,
        })
    }

    /// Advances virtual time by one fix interval.
    pub fn tick(&mut self) {
        self.context.advance_time(self.config.fix_interval());
        self.tick_count += 1;
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}
