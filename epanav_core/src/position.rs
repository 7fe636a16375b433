//! Position sources: live location watch and simulated route playback.
//!
//! Both variants implement [`PositionSource`], a pull-based contract:
//! `next_sample()` yields samples in production order, `Some(Err(_))` once
//! if the source fails, then `None` forever. [`subscribe`] adapts any source
//! to a callback with an unsubscribe handle.

use async_trait::async_trait;
use epanav_env::{GeoPoint, LocationCapability, LocationWatch, NavContext};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::NavError;
use crate::route::RouteModel;
use crate::ticker::Ticker;

/// Producer of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleSource {
    Live,
    Simulated,
}

/// One observed (or replayed) position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionSample {
    pub point: GeoPoint,

    /// Monotonic context time at which the sample was produced
    pub timestamp: Duration,

    pub source: SampleSource,

    /// Horizontal accuracy in meters, live fixes only
    pub accuracy_m: Option<f64>,
}

impl PositionSample {
    pub fn live(point: GeoPoint, timestamp: Duration) -> Self {
        Self {
            point,
            timestamp,
            source: SampleSource::Live,
            accuracy_m: None,
        }
    }

    pub fn simulated(point: GeoPoint, timestamp: Duration) -> Self {
        Self {
            point,
            timestamp,
            source: SampleSource::Simulated,
            accuracy_m: None,
        }
    }
}

/// Common contract of live and simulated sources.
#[async_trait]
pub trait PositionSource: Send {
    /// Which kind of samples this source produces.
    fn kind(&self) -> SampleSource;

    /// Waits for the next sample.
    ///
    /// # Returns
    /// * `Some(Ok(sample))` - Next position, in production order
    /// * `Some(Err(_))` - The source failed; it is already stopped
    /// * `None` - The source has ended (or was unsubscribed)
    async fn next_sample(&mut self) -> Option<Result<PositionSample, NavError>>;

    /// Stops the source and releases its timer or watch handle.
    fn unsubscribe(&mut self);

    /// Playback progress, for simulated sources.
    fn simulation_state(&self) -> Option<SimulationState> {
        None
    }
}

// ========== Live ==========

/// Source wrapping the platform's continuous location watch.
pub struct LiveSource<Ctx: NavContext, Loc: LocationCapability> {
    context: Arc<Ctx>,
    capability: Arc<Loc>,
    watch: Option<LocationWatch>,
}

impl<Ctx: NavContext, Loc: LocationCapability> LiveSource<Ctx, Loc> {
    /// Starts a location watch.
    ///
    /// Fails with `LocationUnavailable` when the capability refuses.
    pub fn subscribe(context: Arc<Ctx>, capability: Arc<Loc>) -> Result<Self, NavError> {
        let watch = capability
            .watch_position()
            .map_err(|e| NavError::LocationUnavailable(e.to_string()))?;
        debug!("Live source subscribed ({})", watch.id());

        Ok(Self {
            context,
            capability,
            watch: Some(watch),
        })
    }

    pub fn is_active(&self) -> bool {
        self.watch.is_some()
    }
}

#[async_trait]
impl<Ctx: NavContext, Loc: LocationCapability> PositionSource for LiveSource<Ctx, Loc> {
    fn kind(&self) -> SampleSource {
        SampleSource::Live
    }

    async fn next_sample(&mut self) -> Option<Result<PositionSample, NavError>> {
        let watch = self.watch.as_mut()?;

        match watch.recv().await {
            Some(Ok(fix)) => Some(Ok(PositionSample {
                point: fix.point,
                timestamp: self.context.now(),
                source: SampleSource::Live,
                accuracy_m: fix.accuracy_m,
            })),
            Some(Err(err)) => {
                warn!("Location watch failed: {}", err);
                self.unsubscribe();
                Some(Err(NavError::LocationUnavailable(err.to_string())))
            }
            None => {
                warn!("Location watch closed by platform");
                self.unsubscribe();
                Some(Err(NavError::LocationUnavailable(
                    "location watch closed".to_string(),
                )))
            }
        }
    }

    fn unsubscribe(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.close();
            self.capability.clear_watch(watch.id());
            debug!("Live source unsubscribed ({})", watch.id());
        }
    }
}

impl<Ctx: NavContext, Loc: LocationCapability> Drop for LiveSource<Ctx, Loc> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// ========== Simulated ==========

/// Lifecycle of a playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimulationStatus {
    Idle,
    Running,
    Finished,
}

/// Progress through a route's waypoints.
///
/// `cursor_index` is the next waypoint to emit; once the last waypoint has
/// been emitted the status is `Finished` and the cursor stays on it. A
/// finished state is never restarted: playback again needs a fresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SimulationState {
    status: SimulationStatus,
    cursor_index: usize,
}

impl SimulationState {
    /// A fresh, idle state.
    pub fn new() -> Self {
        Self {
            status: SimulationStatus::Idle,
            cursor_index: 0,
        }
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    pub fn cursor_index(&self) -> usize {
        self.cursor_index
    }

    /// Idle → Running. Any other starting state is rejected.
    pub fn start(&mut self) -> Result<(), NavError> {
        match self.status {
            SimulationStatus::Idle => {
                self.status = SimulationStatus::Running;
                Ok(())
            }
            SimulationStatus::Running => Err(NavError::InvalidTransition {
                from: "Running",
                action: "start simulation",
            }),
            SimulationStatus::Finished => Err(NavError::InvalidTransition {
                from: "Finished",
                action: "start simulation",
            }),
        }
    }

    /// Emits the waypoint under the cursor and moves on.
    ///
    /// Returns `None` unless running.
    pub fn advance(&mut self, waypoints: &[GeoPoint]) -> Option<GeoPoint> {
        if self.status != SimulationStatus::Running {
            return None;
        }
        let Some(&point) = waypoints.get(self.cursor_index) else {
            self.status = SimulationStatus::Finished;
            return None;
        };

        if self.cursor_index + 1 >= waypoints.len() {
            self.status = SimulationStatus::Finished;
        } else {
            self.cursor_index += 1;
        }
        Some(point)
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic replay of a route, one waypoint per tick.
pub struct SimulatedSource<Ctx: NavContext> {
    context: Arc<Ctx>,
    route: Arc<RouteModel>,
    state: SimulationState,
    ticker: Ticker,
    interval: Duration,
}

impl<Ctx: NavContext> SimulatedSource<Ctx> {
    /// Creates an idle playback of `route`.
    pub fn new(context: Arc<Ctx>, route: Arc<RouteModel>, interval: Duration) -> Self {
        Self {
            context,
            route,
            state: SimulationState::new(),
            ticker: Ticker::new(),
            interval,
        }
    }

    /// Starts playback; the first sample is due one interval from now.
    pub fn start(&mut self) -> Result<(), NavError> {
        self.state.start()?;
        self.ticker.arm(self.context.now(), self.interval);
        debug!(
            "Simulation started: {} waypoints every {:?}",
            self.route.len(),
            self.interval
        );
        Ok(())
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn route(&self) -> &Arc<RouteModel> {
        &self.route
    }
}

#[async_trait]
impl<Ctx: NavContext> PositionSource for SimulatedSource<Ctx> {
    fn kind(&self) -> SampleSource {
        SampleSource::Simulated
    }

    async fn next_sample(&mut self) -> Option<Result<PositionSample, NavError>> {
        loop {
            if self.state.status() != SimulationStatus::Running {
                return None;
            }
            let wait = self.ticker.remaining(self.context.now())?;
            if !wait.is_zero() {
                self.context.sleep(wait).await;
            }

            let now = self.context.now();
            if self.ticker.fire(now).is_none() {
                continue;
            }

            let emitted = self.state.advance(self.route.waypoints());
            if self.state.status() == SimulationStatus::Finished {
                self.ticker.disarm();
            }
            return emitted.map(|point| Ok(PositionSample::simulated(point, now)));
        }
    }

    fn unsubscribe(&mut self) {
        self.ticker.disarm();
    }

    fn simulation_state(&self) -> Option<SimulationState> {
        Some(self.state)
    }
}

// ========== Callback adapter ==========

/// Handle returned by [`subscribe`]; dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    /// Stops delivery. No callback runs after this returns control to the runtime.
    pub fn unsubscribe(self) {
        drop(self);
    }

    /// True while the source is still delivering.
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Drives `source` on a task spawned through `context`, invoking
/// `callback` per item.
///
/// Delivery stops after the first error or when the source ends; the
/// source is released (watch cleared, ticker disarmed) either way.
pub fn subscribe<Ctx, S, F>(context: &Ctx, mut source: S, mut callback: F) -> Subscription
where
    Ctx: NavContext,
    S: PositionSource + 'static,
    F: FnMut(Result<PositionSample, NavError>) + Send + 'static,
{
    let handle = context.spawn("position-subscription", async move {
        while let Some(item) = source.next_sample().await {
            let failed = item.is_err();
            callback(item);
            if failed {
                break;
            }
        }
        source.unsubscribe();
    });

    Subscription { handle }
}
