//! Navigation session: the orchestrator that owns the active route.
//!
//! The session is driven one event at a time through
//! [`NavigationSession::next_event`]. Position samples flow to the heading
//! tracker and (for live samples) the deviation monitor; a deviation may
//! dispatch a reroute whose response is applied on a later step.
//!
//! ```text
//! Idle -> RouteLoaded -> TrackingLive | Simulating -> RouteLoaded (stop)
//! ```

use epanav_env::{GeoPoint, Geocoder, LocationCapability, NavContext, RoutingProvider};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::NavigationConfig;
use crate::deviation::DeviationMonitor;
use crate::display::{CameraController, NavigationFrame, NoopCamera};
use crate::error::NavError;
use crate::heading::HeadingTracker;
use crate::position::{
    LiveSource, PositionSample, PositionSource, SampleSource, SimulatedSource, SimulationState,
};
use crate::reroute::{RerouteCoordinator, RerouteDispatch, RerouteTicket};
use crate::route::RouteModel;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionMode {
    Idle,
    RouteLoaded,
    TrackingLive,
    Simulating,
}

impl SessionMode {
    /// True while a position source is attached.
    pub fn is_tracking(&self) -> bool {
        matches!(self, SessionMode::TrackingLive | SessionMode::Simulating)
    }
}

/// Result of processing one position sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionUpdate {
    pub sample: PositionSample,

    pub heading_degrees: f64,

    pub heading_changed: bool,

    /// Distance to the route, if the deviation monitor evaluated this sample
    pub distance_from_route_m: Option<f64>,

    /// Set when the sample triggered a reroute
    pub reroute: Option<RerouteDispatch>,
}

/// One step of the session's event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A sample was processed
    Position(PositionUpdate),

    /// A reroute response replaced the active route
    RouteReplaced {
        ticket: RerouteTicket,
        route: Arc<RouteModel>,
    },

    /// A reroute failed; the previous route is still active
    RerouteFailed { ticket: RerouteTicket, error: NavError },

    /// Simulated playback reached the last waypoint
    PlaybackFinished,

    /// The position source failed and was detached
    SourceFailed(NavError),
}

enum Step {
    Reroute(RerouteTicket, Result<epanav_env::DirectionsResponse, epanav_env::EnvError>),
    Sample(Option<Result<PositionSample, NavError>>),
}

/// Owns the active route and at most one position source.
pub struct NavigationSession<Ctx, Loc, R>
where
    Ctx: NavContext,
    Loc: LocationCapability,
    R: RoutingProvider,
{
    context: Arc<Ctx>,
    location: Arc<Loc>,
    config: NavigationConfig,

    route: Arc<RouteModel>,
    destination: Option<GeoPoint>,
    revision: u64,

    mode: SessionMode,
    source: Option<Box<dyn PositionSource>>,
    last_playback: Option<SimulationState>,
    last_position: Option<PositionSample>,

    monitor: DeviationMonitor,
    reroute: RerouteCoordinator<R>,
    heading: HeadingTracker,
    camera: Box<dyn CameraController>,
}

impl<Ctx, Loc, R> NavigationSession<Ctx, Loc, R>
where
    Ctx: NavContext,
    Loc: LocationCapability,
    R: RoutingProvider,
{
    pub fn new(context: Arc<Ctx>, location: Arc<Loc>, router: Arc<R>, config: NavigationConfig) -> Self {
        Self {
            monitor: DeviationMonitor::new(config.deviation.clone()),
            reroute: RerouteCoordinator::new(router, &config.routing),
            context,
            location,
            config,
            route: Arc::new(RouteModel::empty()),
            destination: None,
            revision: 0,
            mode: SessionMode::Idle,
            source: None,
            last_playback: None,
            last_position: None,
            heading: HeadingTracker::new(),
            camera: Box::new(NoopCamera),
        }
    }

    /// Attaches the map camera.
    pub fn with_camera(mut self, camera: Box<dyn CameraController>) -> Self {
        self.camera = camera;
        self
    }

    // ========== Route loading ==========

    /// Plans a route between two addresses.
    ///
    /// An absent or blank `start` means "from here": the last known
    /// position, else a one-shot location fix. On failure the session is
    /// left exactly as it was.
    pub async fn plan<G: Geocoder>(
        &mut self,
        geocoder: &G,
        start: Option<&str>,
        destination: &str,
    ) -> Result<Arc<RouteModel>, NavError> {
        let from = match start.map(str::trim).filter(|s| !s.is_empty()) {
            Some(address) => geocode(geocoder, address).await?,
            None => self.current_point().await?,
        };
        let to = geocode(geocoder, destination.trim()).await?;

        self.load_route(from, to).await
    }

    /// Fetches and installs a route between two coordinates.
    pub async fn load_route(&mut self, from: GeoPoint, to: GeoPoint) -> Result<Arc<RouteModel>, NavError> {
        let response = self
            .reroute
            .router()
            .compute_route(from, to, self.config.routing.preference)
            .await
            .map_err(NavError::from_routing)?;
        let route = RouteModel::from_response(
            &response,
            self.config.routing.vehicle_speed_kmh,
            self.context.now(),
        )?;

        self.reroute.cancel();
        self.destination = Some(to);
        let route = self.install_route(route, true);
        if !self.mode.is_tracking() {
            self.mode = SessionMode::RouteLoaded;
        }

        info!(
            "Route loaded: {} waypoints, {:.0}m, ~{} min",
            route.len(),
            route.distance_meters(),
            route.duration_minutes()
        );
        Ok(route)
    }

    async fn current_point(&self) -> Result<GeoPoint, NavError> {
        if let Some(sample) = self.last_position {
            return Ok(sample.point);
        }
        self.location
            .current_position()
            .await
            .map(|fix| fix.point)
            .map_err(|e| NavError::LocationUnavailable(e.to_string()))
    }

    fn install_route(&mut self, route: RouteModel, fit_camera: bool) -> Arc<RouteModel> {
        self.revision += 1;
        let route = Arc::new(route.with_revision(self.revision));
        self.route = Arc::clone(&route);

        if fit_camera {
            if let Some(bounds) = route.bounds() {
                self.camera.fit_bounds(bounds);
            }
        }
        route
    }

    // ========== Source lifecycle ==========

    /// Starts following the platform location watch.
    pub fn start_live_tracking(&mut self) -> Result<(), NavError> {
        self.require_route()?;
        self.detach_source();

        match LiveSource::subscribe(Arc::clone(&self.context), Arc::clone(&self.location)) {
            Ok(source) => {
                self.source = Some(Box::new(source));
                self.mode = SessionMode::TrackingLive;
                info!("Live tracking started");
                Ok(())
            }
            Err(e) => {
                self.mode = SessionMode::RouteLoaded;
                warn!("Live tracking unavailable: {}", e);
                Err(e)
            }
        }
    }

    /// Starts a fresh playback of the current route.
    pub fn start_simulation(&mut self) -> Result<(), NavError> {
        self.require_route()?;
        self.detach_source();

        let mut source = SimulatedSource::new(
            Arc::clone(&self.context),
            Arc::clone(&self.route),
            self.config.simulation.tick_interval(),
        );
        source.start()?;

        self.source = Some(Box::new(source));
        self.last_playback = None;
        self.mode = SessionMode::Simulating;
        info!("Simulation started over {} waypoints", self.route.len());
        Ok(())
    }

    /// Detaches the source and returns to `RouteLoaded`, keeping the route.
    pub fn stop(&mut self) {
        self.detach_source();
        self.reroute.cancel();
        if self.mode.is_tracking() {
            self.mode = SessionMode::RouteLoaded;
            info!("Tracking stopped");
        }
    }

    fn require_route(&self) -> Result<(), NavError> {
        if self.route.is_empty() {
            return Err(NavError::NoActiveRoute);
        }
        Ok(())
    }

    fn detach_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            if let Some(state) = source.simulation_state() {
                self.last_playback = Some(state);
            }
            source.unsubscribe();
            debug!("Detached {:?} source", source.kind());
        }
    }

    // ========== Event loop ==========

    /// Waits for the next reroute response or position sample.
    ///
    /// Reroute responses are handled first when both are ready. Returns
    /// `None` when there is neither a source nor a pending reroute.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.source.is_none() && !self.reroute.in_flight() {
            return None;
        }

        let step = {
            let reroute = &mut self.reroute;
            let source = self.source.as_mut();
            tokio::select! {
                biased;
                (ticket, result) = reroute.response() => Step::Reroute(ticket, result),
                item = next_from(source) => Step::Sample(item),
            }
        };

        let event = match step {
            Step::Reroute(ticket, result) => self.apply_reroute(ticket, result),
            Step::Sample(Some(Ok(sample))) => SessionEvent::Position(self.handle_sample(sample)),
            Step::Sample(Some(Err(error))) => {
                warn!("Position source failed: {}", error);
                self.detach_source();
                self.mode = SessionMode::RouteLoaded;
                SessionEvent::SourceFailed(error)
            }
            Step::Sample(None) => {
                let playback = self
                    .source
                    .as_ref()
                    .map_or(false, |s| s.kind() == SampleSource::Simulated);
                self.detach_source();
                self.mode = SessionMode::RouteLoaded;
                if playback {
                    info!("Simulation finished");
                    SessionEvent::PlaybackFinished
                } else {
                    SessionEvent::SourceFailed(NavError::LocationUnavailable(
                        "position source ended".to_string(),
                    ))
                }
            }
        };
        Some(event)
    }

    fn apply_reroute(
        &mut self,
        ticket: RerouteTicket,
        result: Result<epanav_env::DirectionsResponse, epanav_env::EnvError>,
    ) -> SessionEvent {
        match self.reroute.complete(result, self.context.now()) {
            Ok(route) => {
                let route = self.install_route(route, false);
                info!(
                    "Reroute #{} applied: {} waypoints, {:.0}m",
                    ticket,
                    route.len(),
                    route.distance_meters()
                );
                SessionEvent::RouteReplaced { ticket, route }
            }
            Err(error) => SessionEvent::RerouteFailed { ticket, error },
        }
    }

    /// Processes one sample: heading, camera, and for live samples the
    /// deviation check.
    pub fn handle_sample(&mut self, sample: PositionSample) -> PositionUpdate {
        self.last_position = Some(sample);
        self.camera.follow(sample.point);

        let heading_changed = self.heading.update(sample.point, &self.route);
        if heading_changed {
            self.camera.set_heading(self.heading.heading());
        }

        let mut distance_from_route_m = None;
        let mut reroute = None;
        if sample.source == SampleSource::Live {
            let evaluation = self.monitor.observe(&sample, &self.route);
            distance_from_route_m = evaluation.distance_m;

            if evaluation.trigger_reroute {
                if let Some(destination) = self.destination {
                    info!(
                        "Deviation detected: {:.1}m from route",
                        evaluation.distance_m.unwrap_or_default()
                    );
                    reroute = Some(self.reroute.request(sample.point, destination));
                }
            }
        }

        PositionUpdate {
            sample,
            heading_degrees: self.heading.heading(),
            heading_changed,
            distance_from_route_m,
            reroute,
        }
    }

    // ========== Accessors ==========

    /// Snapshot for the map display.
    pub fn frame(&self) -> NavigationFrame {
        NavigationFrame {
            route: Arc::clone(&self.route),
            position: self.last_position,
            heading_degrees: self.heading.heading(),
            mode: self.mode,
        }
    }

    pub fn route(&self) -> &Arc<RouteModel> {
        &self.route
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn heading(&self) -> f64 {
        self.heading.heading()
    }

    /// Progress of the current (or most recent) playback.
    pub fn simulation_state(&self) -> Option<SimulationState> {
        self.source
            .as_ref()
            .and_then(|s| s.simulation_state())
            .or(self.last_playback)
    }

    pub fn last_position(&self) -> Option<PositionSample> {
        self.last_position
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        self.destination
    }

    pub fn reroute_in_flight(&self) -> bool {
        self.reroute.in_flight()
    }

    pub fn deviation(&self) -> &DeviationMonitor {
        &self.monitor
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }
}

async fn next_from(
    source: Option<&mut Box<dyn PositionSource>>,
) -> Option<Result<PositionSample, NavError>> {
    match source {
        Some(source) => source.next_sample().await,
        None => std::future::pending().await,
    }
}

async fn geocode<G: Geocoder>(geocoder: &G, address: &str) -> Result<GeoPoint, NavError> {
    let failure = || NavError::GeocodeFailure {
        address: address.to_string(),
    };
    if address.is_empty() {
        return Err(failure());
    }

    match geocoder.resolve(address).await {
        Ok(Some(point)) => Ok(point),
        Ok(None) => Err(failure()),
        Err(e) => {
            warn!("Geocoder error for {:?}: {}", address, e);
            Err(failure())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::SimulationStatus;
    use crate::test_support::{
        pt, CameraCall, FakeContext, FakeGeocoder, FakeLocation, FakeRouter, RecordingCamera,
    };
    use epanav_env::{DirectionsResponse, EnvError, LocationFix};
    use std::time::Duration;

    type TestSession = NavigationSession<FakeContext, FakeLocation, FakeRouter>;

    struct Harness {
        ctx: Arc<FakeContext>,
        location: Arc<FakeLocation>,
        router: Arc<FakeRouter>,
        camera: RecordingCamera,
        session: TestSession,
    }

    fn harness_with(router: Arc<FakeRouter>) -> Harness {
        let ctx = FakeContext::shared();
        let location = FakeLocation::shared();
        let camera = RecordingCamera::default();
        let session = NavigationSession::new(
            ctx.clone(),
            location.clone(),
            router.clone(),
            NavigationConfig::default(),
        )
        .with_camera(Box::new(camera.clone()));

        Harness {
            ctx,
            location,
            router,
            camera,
            session,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeRouter::shared())
    }

    fn start() -> GeoPoint {
        pt(60.0, 18.0)
    }

    fn goal() -> GeoPoint {
        pt(60.01, 18.0)
    }

    /// Roughly 550 m east of the start.
    fn far_off() -> GeoPoint {
        pt(60.0, 18.01)
    }

    fn position(event: Option<SessionEvent>) -> PositionUpdate {
        match event {
            Some(SessionEvent::Position(update)) => update,
            other => panic!("expected a position event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_load_route_fits_camera_and_enters_route_loaded() {
        let mut h = harness();
        let route = h.session.load_route(start(), goal()).await.unwrap();

        assert_eq!(h.session.mode(), SessionMode::RouteLoaded);
        assert_eq!(route.len(), 3);
        assert_eq!(route.revision(), 1);
        assert_eq!(h.session.destination(), Some(goal()));
        assert!(matches!(h.camera.calls.lock().unwrap()[0], CameraCall::Fit(_)));
    }

    #[tokio::test]
    async fn test_tracking_requires_route() {
        let mut h = harness();
        assert_eq!(h.session.start_live_tracking(), Err(NavError::NoActiveRoute));
        assert_eq!(h.session.start_simulation(), Err(NavError::NoActiveRoute));
        assert_eq!(h.session.mode(), SessionMode::Idle);
        assert!(h.session.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_plan_geocodes_addresses() {
        let mut h = harness();
        let geocoder = FakeGeocoder::default()
            .with("Storgatan 1", start())
            .with("Hamnen", goal());

        let route = h
            .session
            .plan(&geocoder, Some("Storgatan 1"), "Hamnen")
            .await
            .unwrap();
        assert_eq!(route.waypoints()[0], start());
        assert_eq!(route.waypoints()[2], goal());
    }

    #[tokio::test]
    async fn test_plan_from_here_uses_current_fix() {
        let mut h = harness();
        h.location.set_current(LocationFix::new(start()));
        let geocoder = FakeGeocoder::default().with("Hamnen", goal());

        let route = h.session.plan(&geocoder, Some("  "), "Hamnen").await.unwrap();
        assert_eq!(route.waypoints()[0], start());
    }

    #[tokio::test]
    async fn test_plan_from_here_without_location_fails() {
        let mut h = harness();
        h.location.deny();
        let geocoder = FakeGeocoder::default().with("Hamnen", goal());

        let result = h.session.plan(&geocoder, None, "Hamnen").await;
        assert!(matches!(result, Err(NavError::LocationUnavailable(_))));
        assert_eq!(h.session.mode(), SessionMode::Idle);
        assert_eq!(h.router.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_address_leaves_session_unchanged() {
        let mut h = harness();
        let old = h.session.load_route(start(), goal()).await.unwrap();
        let geocoder = FakeGeocoder::default().with("Hamnen", goal());

        let result = h.session.plan(&geocoder, Some("Nowhere 9"), "Hamnen").await;
        assert_eq!(
            result,
            Err(NavError::GeocodeFailure {
                address: "Nowhere 9".to_string()
            })
        );
        assert!(Arc::ptr_eq(h.session.route(), &old));
    }

    #[tokio::test]
    async fn test_simulation_plays_route_then_finishes() {
        let mut h = harness();
        h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_simulation().unwrap();

        let mut timestamps = Vec::new();
        for _ in 0..3 {
            let update = position(h.session.next_event().await);
            assert_eq!(update.sample.source, SampleSource::Simulated);
            assert_eq!(update.reroute, None);
            timestamps.push(update.sample.timestamp);
        }
        assert_eq!(
            timestamps,
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(3)]
        );

        assert_eq!(h.session.next_event().await, Some(SessionEvent::PlaybackFinished));
        assert_eq!(h.session.mode(), SessionMode::RouteLoaded);
        assert!(h.session.next_event().await.is_none());

        let state = h.session.simulation_state().unwrap();
        assert_eq!(state.status(), SimulationStatus::Finished);
        assert_eq!(state.cursor_index(), 2);
    }

    #[tokio::test]
    async fn test_simulation_drives_camera_heading() {
        let mut h = harness();
        h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_simulation().unwrap();
        while h.session.next_event().await.is_some() {}

        // Route heads due north; the first sample changes nothing from 0
        assert!(h.camera.headings().iter().all(|&d| d < 1e-6 || d > 360.0 - 1e-6));
        let follows = h
            .camera
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, CameraCall::Follow(_)))
            .count();
        assert_eq!(follows, 3);
    }

    #[tokio::test]
    async fn test_live_deviation_reroutes_and_keeps_tracking() {
        let mut h = harness();
        h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_live_tracking().unwrap();

        h.location.push(LocationFix::new(start()));
        let on_route = position(h.session.next_event().await);
        assert_eq!(on_route.reroute, None);
        assert!(on_route.distance_from_route_m.unwrap() < 1.0);

        h.ctx.advance(Duration::from_secs(3));
        h.location.push(LocationFix::new(far_off()));
        let off = position(h.session.next_event().await);
        assert!(matches!(off.reroute, Some(RerouteDispatch::Started(_))));

        match h.session.next_event().await {
            Some(SessionEvent::RouteReplaced { route, .. }) => {
                assert_eq!(route.waypoints()[0], far_off());
                assert_eq!(route.revision(), 2);
                assert!(Arc::ptr_eq(h.session.route(), &route));
            }
            other => panic!("expected a replaced route, got {:?}", other),
        }
        assert_eq!(h.session.mode(), SessionMode::TrackingLive);
        assert_eq!(h.router.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_reroute_keeps_previous_route() {
        let mut h = harness();
        let old = h.session.load_route(start(), goal()).await.unwrap();
        h.router.enqueue(Ok(DirectionsResponse::empty()));
        h.session.start_live_tracking().unwrap();

        h.location.push(LocationFix::new(far_off()));
        position(h.session.next_event().await);

        match h.session.next_event().await {
            Some(SessionEvent::RerouteFailed { error, .. }) => {
                assert!(matches!(error, NavError::RouteUnavailable(_)));
            }
            other => panic!("expected a failed reroute, got {:?}", other),
        }
        assert!(Arc::ptr_eq(h.session.route(), &old));
        assert_eq!(h.session.mode(), SessionMode::TrackingLive);
    }

    #[tokio::test]
    async fn test_trigger_while_reroute_pending_is_skipped() {
        let mut h = harness_with(FakeRouter::gated());
        h.router.release();
        h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_live_tracking().unwrap();

        h.location.push(LocationFix::new(far_off()));
        let first = position(h.session.next_event().await);
        assert!(matches!(first.reroute, Some(RerouteDispatch::Started(_))));

        // Past throttle and cooldown, but the first request is still gated
        h.ctx.advance(Duration::from_secs(6));
        h.location.push(LocationFix::new(far_off()));
        let second = position(h.session.next_event().await);
        assert_eq!(second.reroute, Some(RerouteDispatch::Skipped));

        h.router.release();
        assert!(matches!(
            h.session.next_event().await,
            Some(SessionEvent::RouteReplaced { .. })
        ));
        assert_eq!(h.router.calls(), 2);
    }

    #[tokio::test]
    async fn test_simulated_samples_never_reroute() {
        let mut h = harness();
        h.session.load_route(start(), goal()).await.unwrap();

        let update = h
            .session
            .handle_sample(PositionSample::simulated(far_off(), Duration::ZERO));
        assert_eq!(update.reroute, None);
        assert_eq!(update.distance_from_route_m, None);
    }

    #[tokio::test]
    async fn test_location_failure_detaches_source() {
        let mut h = harness();
        h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_live_tracking().unwrap();

        h.location.fail(EnvError::PositionUnavailable("signal lost".into()));
        assert!(matches!(
            h.session.next_event().await,
            Some(SessionEvent::SourceFailed(NavError::LocationUnavailable(_)))
        ));
        assert_eq!(h.session.mode(), SessionMode::RouteLoaded);
        assert!(h.session.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_denied_location_keeps_route_loaded() {
        let mut h = harness();
        h.session.load_route(start(), goal()).await.unwrap();
        h.location.deny();

        assert!(matches!(
            h.session.start_live_tracking(),
            Err(NavError::LocationUnavailable(_))
        ));
        assert_eq!(h.session.mode(), SessionMode::RouteLoaded);
    }

    #[tokio::test]
    async fn test_switching_to_simulation_clears_live_watch() {
        let mut h = harness();
        h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_live_tracking().unwrap();
        assert_eq!(h.location.active_watches(), 1);

        h.session.start_simulation().unwrap();
        assert_eq!(h.location.active_watches(), 0);
        assert_eq!(h.session.mode(), SessionMode::Simulating);
    }

    #[tokio::test]
    async fn test_restarting_simulation_replaces_running_playback() {
        let mut h = harness();
        let route = h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_simulation().unwrap();
        let first = position(h.session.next_event().await);
        assert_eq!(first.sample.point, route.waypoints()[0]);
        assert_eq!(h.session.simulation_state().unwrap().cursor_index(), 1);

        h.session.start_simulation().unwrap();
        let state = h.session.simulation_state().unwrap();
        assert_eq!(state.status(), SimulationStatus::Running);
        assert_eq!(state.cursor_index(), 0);

        let mut replayed = Vec::new();
        loop {
            match h.session.next_event().await {
                Some(SessionEvent::Position(update)) => replayed.push(update.sample.point),
                Some(SessionEvent::PlaybackFinished) => break,
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(replayed, route.waypoints().to_vec());
        assert!(h.session.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_preserves_route() {
        let mut h = harness();
        let route = h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_simulation().unwrap();
        position(h.session.next_event().await);

        h.session.stop();
        assert_eq!(h.session.mode(), SessionMode::RouteLoaded);
        assert!(Arc::ptr_eq(h.session.route(), &route));
        assert!(h.session.next_event().await.is_none());
        assert_eq!(h.session.simulation_state().unwrap().cursor_index(), 1);
    }

    #[tokio::test]
    async fn test_replanning_while_tracking_keeps_mode() {
        let mut h = harness();
        h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_live_tracking().unwrap();

        let route = h.session.load_route(start(), far_off()).await.unwrap();
        assert_eq!(h.session.mode(), SessionMode::TrackingLive);
        assert_eq!(route.revision(), 2);
        assert_eq!(h.session.destination(), Some(far_off()));
    }

    #[tokio::test]
    async fn test_frame_reflects_session() {
        let mut h = harness();
        h.session.load_route(start(), goal()).await.unwrap();
        h.session.start_simulation().unwrap();
        let update = position(h.session.next_event().await);

        let frame = h.session.frame();
        assert_eq!(frame.mode, SessionMode::Simulating);
        assert_eq!(frame.position, Some(update.sample));
        assert_eq!(frame.heading_degrees, update.heading_degrees);
        assert!(serde_json::to_string(&frame).is_ok());
    }
}
