//! In-crate test doubles for the environment seams.

use async_trait::async_trait;
use epanav_env::{
    DirectionsResponse, EnvError, GeoPoint, Geocoder, LocationCapability, LocationFix,
    LocationWatch, NavContext, ProviderRoute, RouteLegSummary, RoutePreference, RoutingProvider,
    WatchId,
};
use geo::Rect;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::display::CameraController;
use crate::geo_math::route_length_meters;
use crate::polyline;
use crate::route::RouteModel;

pub fn pt(lat: f64, lon: f64) -> GeoPoint {
    GeoPoint::new(lat, lon).unwrap()
}

pub fn route_of(coords: &[(f64, f64)]) -> RouteModel {
    let waypoints: Vec<GeoPoint> = coords.iter().map(|&(lat, lon)| pt(lat, lon)).collect();
    let distance = route_length_meters(&waypoints);
    RouteModel::new(waypoints, distance, 30.0, Duration::ZERO).unwrap()
}

pub fn response_for(waypoints: &[GeoPoint]) -> DirectionsResponse {
    let distance = route_length_meters(waypoints);
    DirectionsResponse {
        routes: vec![ProviderRoute {
            geometry: polyline::encode(waypoints),
            summary: Some(RouteLegSummary {
                distance: Some(distance),
                duration: Some(distance / 8.0),
            }),
            segments: Vec::new(),
        }],
    }
}

/// Virtual clock; `sleep` advances it instantly.
#[derive(Default)]
pub struct FakeContext {
    now_ns: Mutex<u64>,
    spawned: AtomicUsize,
}

impl FakeContext {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn advance(&self, by: Duration) {
        *self.now_ns.lock().unwrap() += by.as_nanos() as u64;
    }

    /// Number of tasks started through `spawn`.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NavContext for FakeContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(*self.now_ns.lock().unwrap())
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn spawn<F>(&self, _name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(future)
    }

    fn seed(&self) -> u64 {
        0
    }
}

/// Location capability fed by the test.
#[derive(Default)]
pub struct FakeLocation {
    watches: Mutex<HashMap<WatchId, mpsc::Sender<Result<LocationFix, EnvError>>>>,
    next_id: Mutex<u64>,
    denied: Mutex<bool>,
    current: Mutex<Option<LocationFix>>,
}

impl FakeLocation {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deny(&self) {
        *self.denied.lock().unwrap() = true;
    }

    pub fn set_current(&self, fix: LocationFix) {
        *self.current.lock().unwrap() = Some(fix);
    }

    pub fn push(&self, fix: LocationFix) {
        for tx in self.watches.lock().unwrap().values() {
            let _ = tx.try_send(Ok(fix));
        }
    }

    pub fn fail(&self, err: EnvError) {
        for (_, tx) in self.watches.lock().unwrap().drain() {
            let _ = tx.try_send(Err(err.clone()));
        }
    }

    pub fn active_watches(&self) -> usize {
        self.watches.lock().unwrap().len()
    }
}

#[async_trait]
impl LocationCapability for FakeLocation {
    async fn current_position(&self) -> Result<LocationFix, EnvError> {
        if *self.denied.lock().unwrap() {
            return Err(EnvError::PermissionDenied);
        }
        let current = *self.current.lock().unwrap();
        current.ok_or_else(|| EnvError::PositionUnavailable("no fix yet".into()))
    }

    fn watch_position(&self) -> Result<LocationWatch, EnvError> {
        if *self.denied.lock().unwrap() {
            return Err(EnvError::PermissionDenied);
        }
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        let id = WatchId(*next);
        let (tx, rx) = mpsc::channel(64);
        self.watches.lock().unwrap().insert(id, tx);
        Ok(LocationWatch::new(id, rx))
    }

    fn clear_watch(&self, id: WatchId) {
        self.watches.lock().unwrap().remove(&id);
    }
}

/// Routing provider with call counting, queued answers and an optional gate.
pub struct FakeRouter {
    calls: AtomicUsize,
    queued: Mutex<VecDeque<Result<DirectionsResponse, EnvError>>>,
    gate: Option<Semaphore>,
}

impl FakeRouter {
    /// Answers immediately with a straight route.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            queued: Mutex::new(VecDeque::new()),
            gate: None,
        })
    }

    /// Holds every answer until [`release`](Self::release).
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            queued: Mutex::new(VecDeque::new()),
            gate: Some(Semaphore::new(0)),
        })
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn enqueue(&self, answer: Result<DirectionsResponse, EnvError>) {
        self.queued.lock().unwrap().push_back(answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoutingProvider for FakeRouter {
    async fn compute_route(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        _preference: RoutePreference,
    ) -> Result<DirectionsResponse, EnvError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let queued = self.queued.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            let mid = pt(
                (from.latitude() + to.latitude()) / 2.0,
                (from.longitude() + to.longitude()) / 2.0,
            );
            Ok(response_for(&[from, mid, to]))
        })
    }
}

/// Address book geocoder.
#[derive(Default)]
pub struct FakeGeocoder {
    book: HashMap<String, GeoPoint>,
}

impl FakeGeocoder {
    pub fn with(mut self, address: &str, point: GeoPoint) -> Self {
        self.book.insert(address.to_string(), point);
        self
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn resolve(&self, address: &str) -> Result<Option<GeoPoint>, EnvError> {
        Ok(self.book.get(address).copied())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CameraCall {
    Heading(f64),
    Follow(GeoPoint),
    Fit(Rect<f64>),
}

/// Camera that records every command.
#[derive(Clone, Default)]
pub struct RecordingCamera {
    pub calls: Arc<Mutex<Vec<CameraCall>>>,
}

impl RecordingCamera {
    pub fn headings(&self) -> Vec<f64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                CameraCall::Heading(h) => Some(*h),
                _ => None,
            })
            .collect()
    }
}

impl CameraController for RecordingCamera {
    fn set_heading(&mut self, degrees: f64) {
        self.calls.lock().unwrap().push(CameraCall::Heading(degrees));
    }

    fn follow(&mut self, point: GeoPoint) {
        self.calls.lock().unwrap().push(CameraCall::Follow(point));
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>) {
        self.calls.lock().unwrap().push(CameraCall::Fit(bounds));
    }
}
