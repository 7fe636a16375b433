//! Off-route detection.
//!
//! Two independent gates must both pass before a reroute is signalled:
//! evaluation runs at most once per `evaluation_interval` (samples in
//! between are displayed but not evaluated), and a trigger needs at least
//! `reroute_cooldown` since the previous trigger.

use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::config::DeviationConfig;
use crate::geo_math::nearest_point_distance;
use crate::position::PositionSample;
use crate::route::RouteModel;

/// Timing state of the monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeviationState {
    /// When the last reroute was triggered
    pub last_reroute_at: Option<Duration>,

    /// When a sample was last evaluated
    pub last_evaluated_at: Option<Duration>,

    /// True while the reroute cooldown suppresses triggers
    pub cooldown_active: bool,
}

/// Result of one `evaluate` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub trigger_reroute: bool,

    pub new_state: DeviationState,

    /// Distance to the route when the sample was evaluated, `None` if skipped
    pub distance_m: Option<f64>,
}

impl Evaluation {
    fn skipped(state: &DeviationState) -> Self {
        Self {
            trigger_reroute: false,
            new_state: *state,
            distance_m: None,
        }
    }

    /// True if the throttle let this sample through.
    pub fn was_evaluated(&self) -> bool {
        self.distance_m.is_some()
    }
}

/// Decides when the agent has strayed far enough to reroute.
#[derive(Debug, Clone)]
pub struct DeviationMonitor {
    config: DeviationConfig,
    state: DeviationState,
}

impl DeviationMonitor {
    pub fn new(config: DeviationConfig) -> Self {
        Self {
            config,
            state: DeviationState::default(),
        }
    }

    pub fn config(&self) -> &DeviationConfig {
        &self.config
    }

    pub fn state(&self) -> DeviationState {
        self.state
    }

    /// Evaluates `sample` against `route` from `state` without committing.
    pub fn evaluate(
        &self,
        sample: &PositionSample,
        route: &RouteModel,
        state: &DeviationState,
    ) -> Evaluation {
        if route.is_empty() {
            return Evaluation::skipped(state);
        }

        let now = sample.timestamp;
        if let Some(last) = state.last_evaluated_at {
            if now.saturating_sub(last) < self.config.evaluation_interval() {
                return Evaluation::skipped(state);
            }
        }

        let distance = nearest_point_distance(sample.point, route.waypoints());
        let cooled_down = state
            .last_reroute_at
            .map_or(true, |t| now.saturating_sub(t) >= self.config.reroute_cooldown());
        let trigger = distance > self.config.threshold_m && cooled_down;

        let new_state = DeviationState {
            last_reroute_at: if trigger { Some(now) } else { state.last_reroute_at },
            last_evaluated_at: Some(now),
            cooldown_active: trigger || !cooled_down,
        };

        if distance > self.config.threshold_m {
            debug!(
                "Off route by {:.1}m (threshold {:.0}m), trigger={}",
                distance, self.config.threshold_m, trigger
            );
        }

        Evaluation {
            trigger_reroute: trigger,
            new_state,
            distance_m: Some(distance),
        }
    }

    /// Evaluates against the monitor's own state and commits the result.
    pub fn observe(&mut self, sample: &PositionSample, route: &RouteModel) -> Evaluation {
        let evaluation = self.evaluate(sample, route, &self.state);
        self.state = evaluation.new_state;
        evaluation
    }
}

impl Default for DeviationMonitor {
    fn default() -> Self {
        Self::new(DeviationConfig::default())
    }
}
