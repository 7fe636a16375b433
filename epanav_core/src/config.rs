//! Engine configuration.
//!
//! Every field has a default matching the field-tested behaviour, so a
//! partial JSON document (or none at all) yields a working configuration.

use epanav_env::RoutePreference;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a navigation session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub deviation: DeviationConfig,
    pub simulation: SimulationConfig,
    pub routing: RoutingConfig,
}

impl NavigationConfig {
    /// Parses a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Deviation detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviationConfig {
    /// Distance from the nearest waypoint that counts as off-route (default: 40)
    pub threshold_m: f64,

    /// Minimum spacing between deviation evaluations (default: 3000)
    pub evaluation_interval_ms: u64,

    /// Minimum spacing between reroute triggers (default: 5000)
    pub reroute_cooldown_ms: u64,
}

impl DeviationConfig {
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.evaluation_interval_ms)
    }

    pub fn reroute_cooldown(&self) -> Duration {
        Duration::from_millis(self.reroute_cooldown_ms)
    }
}

impl Default for DeviationConfig {
    fn default() -> Self {
        Self {
            threshold_m: 40.0,
            evaluation_interval_ms: 3_000,
            reroute_cooldown_ms: 5_000,
        }
    }
}

/// Simulated playback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Interval between simulated samples (default: 1000)
    pub tick_interval_ms: u64,
}

impl SimulationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
        }
    }
}

/// Routing request settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub preference: RoutePreference,

    /// Cruising speed for the duration estimate (default: 30, the EPA limit)
    pub vehicle_speed_kmh: f64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            preference: RoutePreference::Shortest,
            vehicle_speed_kmh: 30.0,
        }
    }
}
