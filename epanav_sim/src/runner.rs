//! Scenario runner - drives the navigation session through scripted trips.

use epanav_core::geo_math::distance_meters;
use epanav_core::{NavError, RerouteDispatch, RouteModel, SessionEvent, SessionMode, SimulationStatus};
use epanav_env::{EnvError, LocationFix, NavContext};
use rand_distr::NormalError;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::oracle::{offset_meters, DrivePlan, Oracle};
use crate::scenarios::ScenarioId;
use crate::world::{CameraStats, SimConfig, SimWorld, DEPOT_ADDRESS, HARBOUR_ADDRESS};

/// RNG stream for GPS noise.
const NOISE_STREAM: u64 = 0x6e6f_6973_65;

/// Lateral offset of the detour's turning point (meters east of the route).
const DETOUR_OFFSET_M: f64 = 300.0;

/// Why a scenario failed.
#[derive(Debug, Error)]
pub enum ScenarioFailure {
    #[error("navigation error: {0}")]
    Nav(#[from] NavError),

    #[error("environment error: {0}")]
    Env(#[from] EnvError),

    #[error("invalid GPS noise: {0}")]
    Noise(#[from] NormalError),

    #[error("{0}")]
    Assertion(String),
}

fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), ScenarioFailure> {
    if condition {
        Ok(())
    } else {
        Err(ScenarioFailure::Assertion(message()))
    }
}

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Fix (or playback) ticks executed
    pub total_ticks: u64,

    /// Final virtual time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScenarioMetrics {
    /// GPS fixes delivered to the session
    pub fixes_delivered: u64,

    /// Position samples processed (live or simulated)
    pub samples: u64,

    /// Samples the deviation monitor evaluated
    pub evaluations: u64,

    pub reroutes_started: u64,

    /// Triggers dropped because a request was in flight
    pub reroutes_skipped: u64,

    pub reroutes_applied: u64,

    pub reroutes_failed: u64,

    pub source_failures: u64,

    pub provider_calls: u64,

    /// Largest distance from the active route seen at an evaluation
    pub max_deviation_m: f64,

    /// Smallest gap between two evaluations
    pub min_evaluation_gap_secs: Option<f64>,

    /// Smallest gap between two reroute triggers
    pub min_reroute_gap_secs: Option<f64>,

    /// Distance from the last sample to the destination
    pub final_distance_to_goal_m: Option<f64>,

    pub camera: CameraStats,
}

/// Event timestamps used for the timing invariants.
#[derive(Debug, Default)]
struct Timeline {
    evaluations: Vec<Duration>,
    triggers: Vec<Duration>,

    /// The drive reached the end of its plan
    arrived: bool,
}

fn min_gap(times: &[Duration]) -> Option<Duration> {
    times.windows(2).map(|w| w[1].saturating_sub(w[0])).min()
}

/// Runs navigation scenarios.
pub struct ScenarioRunner {
    /// Harness configuration (the seed lives here)
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            config: SimConfig {
                seed,
                ..SimConfig::default()
            },
        }
    }

    /// Replaces the harness configuration, keeping the runner's seed.
    pub fn with_config(mut self, config: SimConfig) -> Self {
        let seed = self.config.seed;
        self.config = SimConfig { seed, ..config };
        self
    }

    /// Sets the maximum drive duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.config.max_duration_secs = secs;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario on a fresh single-threaded runtime.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(self.run_async(scenario)),
            Err(e) => ScenarioResult {
                scenario,
                seed: self.config.seed,
                passed: false,
                total_ticks: 0,
                final_time_secs: 0.0,
                failure_reason: Some(format!("failed to build runtime: {}", e)),
                metrics: ScenarioMetrics::default(),
            },
        }
    }

    /// Runs a scenario on the current runtime.
    pub async fn run_async(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);
        debug!("  {}", scenario.description());

        let mut metrics = ScenarioMetrics::default();
        let mut world = match SimWorld::new(self.config.clone()) {
            Ok(world) => world,
            Err(e) => {
                return ScenarioResult {
                    scenario,
                    seed: self.config.seed,
                    passed: false,
                    total_ticks: 0,
                    final_time_secs: 0.0,
                    failure_reason: Some(e.to_string()),
                    metrics,
                }
            }
        };

        let outcome = match scenario {
            ScenarioId::OnRoute => self.run_on_route(&mut world, &mut metrics).await,
            ScenarioId::Detour => self.run_detour(&mut world, &mut metrics).await,
            ScenarioId::NoisyFix => self.run_noisy_fix(&mut world, &mut metrics).await,
            ScenarioId::ProviderOutage => self.run_provider_outage(&mut world, &mut metrics).await,
            ScenarioId::Playback => self.run_playback(&mut world, &mut metrics).await,
            ScenarioId::PermissionDenied => {
                self.run_permission_denied(&mut world, &mut metrics).await
            }
        };

        metrics.provider_calls = world.router.calls();
        metrics.camera = world.camera.stats();

        if let Err(e) = &outcome {
            warn!("Scenario {} failed: {}", scenario.name(), e);
        }

        ScenarioResult {
            scenario,
            seed: self.config.seed,
            passed: outcome.is_ok(),
            total_ticks: world.tick_count(),
            final_time_secs: world.time(),
            failure_reason: outcome.err().map(|e| e.to_string()),
            metrics,
        }
    }

    // ========== Scenarios ==========

    /// NAV-001: OnRoute - drive the planned route exactly.
    ///
    /// **Assertion**: no reroute fires and the drive ends at the destination.
    async fn run_on_route(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
    ) -> Result<(), ScenarioFailure> {
        info!("NAV-001: OnRoute");
        plan_trip(world).await?;

        let plan = DrivePlan::straight(world.depot, world.harbour, self.config.vehicle_speed_kmh);
        let mut oracle = Oracle::new(plan, world.context.derive_rng(NOISE_STREAM))
            .with_noise(self.config.gps_noise_std_m)?;

        let timeline = self.drive(world, &mut oracle, metrics).await?;
        self.check_live_invariants(world, metrics, &timeline)?;

        ensure(metrics.reroutes_started == 0, || {
            format!("{} reroute(s) fired on route", metrics.reroutes_started)
        })?;
        check_arrival(world, &timeline, metrics)
    }

    /// NAV-002: Detour - swerve off the route.
    ///
    /// **Assertion**: the session reroutes, every trigger respects the
    /// cooldown, and the final route still ends at the destination.
    async fn run_detour(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
    ) -> Result<(), ScenarioFailure> {
        info!("NAV-002: Detour");
        plan_trip(world).await?;

        let plan = detour_plan(world, self.config.vehicle_speed_kmh);
        let mut oracle = Oracle::new(plan, world.context.derive_rng(NOISE_STREAM))
            .with_noise(self.config.gps_noise_std_m)?;

        let timeline = self.drive(world, &mut oracle, metrics).await?;
        self.check_live_invariants(world, metrics, &timeline)?;

        ensure(metrics.reroutes_applied >= 1, || {
            "detour never produced a new route".to_string()
        })?;
        ensure(metrics.reroutes_failed == 0, || {
            format!("{} reroute(s) failed without faults", metrics.reroutes_failed)
        })?;
        check_route_destination(world)?;
        check_arrival(world, &timeline, metrics)
    }

    /// NAV-003: NoisyFix - heavy GPS noise while on route.
    ///
    /// **Assertion**: noise alone never triggers a reroute, and the
    /// evaluation throttle holds under 1 Hz fixes.
    async fn run_noisy_fix(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
    ) -> Result<(), ScenarioFailure> {
        info!("NAV-003: NoisyFix");
        plan_trip(world).await?;

        let noise = self.config.gps_noise_std_m.max(8.0);
        let plan = DrivePlan::straight(world.depot, world.harbour, self.config.vehicle_speed_kmh);
        let mut oracle =
            Oracle::new(plan, world.context.derive_rng(NOISE_STREAM)).with_noise(noise)?;

        let timeline = self.drive(world, &mut oracle, metrics).await?;
        self.check_live_invariants(world, metrics, &timeline)?;

        ensure(metrics.reroutes_started == 0, || {
            format!(
                "{} reroute(s) from {:.0}m noise (max deviation {:.1}m)",
                metrics.reroutes_started, noise, metrics.max_deviation_m
            )
        })?;
        ensure(metrics.evaluations < metrics.samples, || {
            "every sample was evaluated; throttle inactive".to_string()
        })
    }

    /// NAV-004: ProviderOutage - the provider fails during a detour.
    ///
    /// **Assertion**: failed reroutes keep the previous route, nothing is
    /// retried automatically, and a later trigger recovers.
    async fn run_provider_outage(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
    ) -> Result<(), ScenarioFailure> {
        info!("NAV-004: ProviderOutage");
        plan_trip(world).await?;
        world.router.fail_next(1);
        world.router.empty_next(1);

        let plan = detour_plan(world, self.config.vehicle_speed_kmh);
        let mut oracle = Oracle::new(plan, world.context.derive_rng(NOISE_STREAM))
            .with_noise(self.config.gps_noise_std_m)?;

        let timeline = self.drive(world, &mut oracle, metrics).await?;
        self.check_live_invariants(world, metrics, &timeline)?;

        ensure(metrics.reroutes_failed == 2, || {
            format!("expected 2 failed reroutes, saw {}", metrics.reroutes_failed)
        })?;
        ensure(metrics.reroutes_applied >= 1, || {
            "session never recovered from the outage".to_string()
        })?;
        check_route_destination(world)
    }

    /// NAV-005: Playback - replay the route one waypoint per tick.
    ///
    /// **Assertion**: every waypoint is emitted once, in order, one tick
    /// apart, and playback then stops on the last index.
    async fn run_playback(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
    ) -> Result<(), ScenarioFailure> {
        info!("NAV-005: Playback");
        let route = plan_trip(world).await?;
        world.session.start_simulation()?;

        let tick = self.config.navigation.simulation.tick_interval();
        let mut emitted = Vec::with_capacity(route.len());
        let mut timestamps = Vec::with_capacity(route.len());
        let mut finished = false;

        while let Some(event) = world.session.next_event().await {
            match event {
                SessionEvent::Position(update) => {
                    ensure(update.reroute.is_none(), || {
                        "simulated sample triggered a reroute".to_string()
                    })?;
                    metrics.samples += 1;
                    emitted.push(update.sample.point);
                    timestamps.push(update.sample.timestamp);
                }
                SessionEvent::PlaybackFinished => finished = true,
                other => {
                    return Err(ScenarioFailure::Assertion(format!(
                        "unexpected event during playback: {:?}",
                        other
                    )))
                }
            }
        }

        ensure(finished, || "playback never finished".to_string())?;
        ensure(emitted.as_slice() == route.waypoints(), || {
            format!("emitted {} of {} waypoints", emitted.len(), route.len())
        })?;
        ensure(
            timestamps.windows(2).all(|w| w[1].saturating_sub(w[0]) == tick),
            || "playback ticks were not evenly spaced".to_string(),
        )?;

        let state = world
            .session
            .simulation_state()
            .ok_or_else(|| ScenarioFailure::Assertion("no playback state".to_string()))?;
        ensure(state.status() == SimulationStatus::Finished, || {
            format!("playback ended in {:?}", state.status())
        })?;
        ensure(state.cursor_index() + 1 == route.len(), || {
            format!("cursor stopped at {} of {}", state.cursor_index(), route.len())
        })?;
        ensure(world.session.mode() == SessionMode::RouteLoaded, || {
            format!("mode after playback: {:?}", world.session.mode())
        })?;

        metrics.final_distance_to_goal_m = emitted
            .last()
            .map(|p| distance_meters(*p, world.harbour));
        Ok(())
    }

    /// NAV-006: PermissionDenied - location refused, later lost.
    ///
    /// **Assertion**: denial surfaces as `LocationUnavailable` without
    /// touching the session; signal loss detaches the live source.
    async fn run_permission_denied(
        &self,
        world: &mut SimWorld,
        metrics: &mut ScenarioMetrics,
    ) -> Result<(), ScenarioFailure> {
        info!("NAV-006: PermissionDenied");
        world.location.deny_permission();

        let from_here = world.session.plan(&world.geocoder, None, HARBOUR_ADDRESS).await;
        ensure(matches!(from_here, Err(NavError::LocationUnavailable(_))), || {
            format!("planning from here without permission gave {:?}", from_here)
        })?;
        ensure(world.session.mode() == SessionMode::Idle, || {
            "failed plan changed the session".to_string()
        })?;

        plan_trip(world).await?;
        let tracking = world.session.start_live_tracking();
        ensure(matches!(tracking, Err(NavError::LocationUnavailable(_))), || {
            format!("tracking without permission gave {:?}", tracking)
        })?;
        ensure(world.session.mode() == SessionMode::RouteLoaded, || {
            format!("mode after denied tracking: {:?}", world.session.mode())
        })?;

        world.location.grant_permission();
        world.session.start_live_tracking()?;

        let plan = DrivePlan::straight(world.depot, world.harbour, self.config.vehicle_speed_kmh);
        for _ in 0..5 {
            world.tick();
            let Some(point) = plan.position_at(world.context.now()) else {
                break;
            };
            if world.location.push(LocationFix::new(point)) == 0 {
                continue;
            }
            metrics.fixes_delivered += 1;
            if let Some(SessionEvent::Position(_)) = world.session.next_event().await {
                metrics.samples += 1;
            }
        }

        world.location.lose_signal();
        match world.session.next_event().await {
            Some(SessionEvent::SourceFailed(NavError::LocationUnavailable(_))) => {
                metrics.source_failures += 1;
            }
            other => {
                return Err(ScenarioFailure::Assertion(format!(
                    "signal loss produced {:?}",
                    other
                )))
            }
        }

        ensure(world.session.mode() == SessionMode::RouteLoaded, || {
            format!("mode after signal loss: {:?}", world.session.mode())
        })?;
        ensure(world.location.active_watches() == 0, || {
            "signal loss left a watch open".to_string()
        })?;
        ensure(world.session.next_event().await.is_none(), || {
            "detached session kept emitting".to_string()
        })?;
        ensure(metrics.samples == metrics.fixes_delivered, || {
            format!("{} fixes but {} samples", metrics.fixes_delivered, metrics.samples)
        })
    }

    // ========== Drive loop ==========

    /// Starts live tracking and feeds one fix per tick until the plan ends.
    ///
    /// After each fix, events are drained until the fix was processed and
    /// no reroute is in flight, so the loop never waits on an idle source.
    async fn drive(
        &self,
        world: &mut SimWorld,
        oracle: &mut Oracle,
        metrics: &mut ScenarioMetrics,
    ) -> Result<Timeline, ScenarioFailure> {
        world.session.start_live_tracking()?;

        let mut timeline = Timeline::default();
        let start = world.context.now();
        let limit = self.config.max_duration();

        loop {
            world.tick();
            let elapsed = world.context.now().saturating_sub(start);
            if elapsed > limit {
                break;
            }
            let Some(fix) = oracle.observe(elapsed) else {
                break;
            };

            let mut awaiting_fix = world.location.push(fix) > 0;
            if awaiting_fix {
                metrics.fixes_delivered += 1;
            }

            while awaiting_fix || world.session.reroute_in_flight() {
                let Some(event) = world.session.next_event().await else {
                    break;
                };
                if matches!(event, SessionEvent::Position(_) | SessionEvent::SourceFailed(_)) {
                    awaiting_fix = false;
                }
                record(world, event, metrics, &mut timeline)?;
            }

            if oracle.plan().is_finished(elapsed) {
                timeline.arrived = true;
                break;
            }
        }

        world.session.stop();
        metrics.min_evaluation_gap_secs = min_gap(&timeline.evaluations).map(|d| d.as_secs_f64());
        metrics.min_reroute_gap_secs = min_gap(&timeline.triggers).map(|d| d.as_secs_f64());
        Ok(timeline)
    }

    /// Invariants every live drive must hold.
    fn check_live_invariants(
        &self,
        world: &SimWorld,
        metrics: &ScenarioMetrics,
        timeline: &Timeline,
    ) -> Result<(), ScenarioFailure> {
        let deviation = &self.config.navigation.deviation;

        ensure(metrics.samples == metrics.fixes_delivered, || {
            format!("{} fixes delivered, {} displayed", metrics.fixes_delivered, metrics.samples)
        })?;
        if let Some(gap) = min_gap(&timeline.evaluations) {
            ensure(gap >= deviation.evaluation_interval(), || {
                format!("evaluations {:?} apart", gap)
            })?;
        }
        if let Some(gap) = min_gap(&timeline.triggers) {
            ensure(gap >= deviation.reroute_cooldown(), || {
                format!("reroutes {:?} apart", gap)
            })?;
        }
        ensure(
            metrics.reroutes_applied + metrics.reroutes_failed == metrics.reroutes_started,
            || "a reroute request was lost".to_string(),
        )?;

        // One call for the initial plan, one per dispatched reroute
        let calls = world.router.calls();
        ensure(calls == 1 + metrics.reroutes_started, || {
            format!(
                "{} provider calls for {} reroutes",
                calls, metrics.reroutes_started
            )
        })
    }
}

async fn plan_trip(world: &mut SimWorld) -> Result<Arc<RouteModel>, ScenarioFailure> {
    let route = world
        .session
        .plan(&world.geocoder, Some(DEPOT_ADDRESS), HARBOUR_ADDRESS)
        .await?;
    debug!(
        "Planned {} waypoints, {:.0}m, ~{} min at EPA speed",
        route.len(),
        route.distance_meters(),
        route.duration_minutes()
    );
    Ok(route)
}

fn detour_plan(world: &SimWorld, speed_kmh: f64) -> DrivePlan {
    let straight = DrivePlan::straight(world.depot, world.harbour, speed_kmh);
    let midpoint = straight
        .position_at(straight.duration() / 2)
        .unwrap_or(world.depot);
    let via = offset_meters(midpoint, 0.0, DETOUR_OFFSET_M);
    DrivePlan::with_detour(world.depot, via, world.harbour, speed_kmh)
}

fn record(
    world: &SimWorld,
    event: SessionEvent,
    metrics: &mut ScenarioMetrics,
    timeline: &mut Timeline,
) -> Result<(), ScenarioFailure> {
    match event {
        SessionEvent::Position(update) => {
            metrics.samples += 1;
            metrics.final_distance_to_goal_m = Some(distance_meters(update.sample.point, world.harbour));

            if let Some(distance) = update.distance_from_route_m {
                metrics.evaluations += 1;
                metrics.max_deviation_m = metrics.max_deviation_m.max(distance);
                timeline.evaluations.push(update.sample.timestamp);
            }
            match update.reroute {
                Some(RerouteDispatch::Started(_)) => {
                    metrics.reroutes_started += 1;
                    timeline.triggers.push(update.sample.timestamp);
                }
                Some(RerouteDispatch::Skipped) => {
                    metrics.reroutes_skipped += 1;
                    timeline.triggers.push(update.sample.timestamp);
                }
                None => {}
            }
        }
        SessionEvent::RouteReplaced { ticket, route } => {
            metrics.reroutes_applied += 1;
            debug!("Reroute #{} -> {} waypoints", ticket, route.len());
        }
        SessionEvent::RerouteFailed { ticket, error } => {
            metrics.reroutes_failed += 1;
            let revision = world.session.route().revision();
            let expected = 1 + metrics.reroutes_applied;
            debug!("Reroute #{} failed: {}", ticket, error);
            ensure(revision == expected, || {
                format!("failed reroute changed the route (revision {})", revision)
            })?;
        }
        SessionEvent::PlaybackFinished => {}
        SessionEvent::SourceFailed(error) => {
            metrics.source_failures += 1;
            return Err(ScenarioFailure::Nav(error));
        }
    }
    Ok(())
}

fn check_route_destination(world: &SimWorld) -> Result<(), ScenarioFailure> {
    let end = world.session.route().waypoints().last().copied();
    let off = end.map(|p| distance_meters(p, world.harbour));
    ensure(off.map_or(false, |d| d < 2.0), || {
        format!("active route ends {:?}m from the destination", off)
    })
}

fn check_arrival(
    world: &SimWorld,
    timeline: &Timeline,
    metrics: &ScenarioMetrics,
) -> Result<(), ScenarioFailure> {
    // Only meaningful when the drive was not cut short
    if !timeline.arrived {
        return Ok(());
    }
    let tolerance = 20.0 + 4.0 * world.config.gps_noise_std_m;
    ensure(
        metrics.final_distance_to_goal_m.map_or(false, |d| d < tolerance),
        || format!("drive ended {:?}m from the destination", metrics.final_distance_to_goal_m),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_gap() {
        let times = [Duration::from_secs(0), Duration::from_secs(3), Duration::from_secs(9)];
        assert_eq!(min_gap(&times), Some(Duration::from_secs(3)));
        assert_eq!(min_gap(&times[..1]), None);
    }

    #[test]
    fn test_with_config_keeps_seed() {
        let runner = ScenarioRunner::new(99).with_config(SimConfig {
            seed: 1,
            gps_noise_std_m: 2.0,
            ..SimConfig::default()
        });
        assert_eq!(runner.config().seed, 99);
        assert_eq!(runner.config().gps_noise_std_m, 2.0);
    }

    #[test]
    fn test_playback_passes() {
        let result = ScenarioRunner::new(42).run(ScenarioId::Playback);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.samples > 100);
        assert_eq!(result.metrics.provider_calls, 1);
    }

    #[test]
    fn test_detour_reroutes() {
        let result = ScenarioRunner::new(42).run(ScenarioId::Detour);
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(result.metrics.reroutes_started >= 1);
        assert!(result.metrics.min_evaluation_gap_secs.unwrap() >= 3.0);
    }
}
