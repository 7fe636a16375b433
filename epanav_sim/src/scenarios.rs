//! Navigation scenarios for the simulation harness.

use serde::Serialize;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    /// NAV-001: Drive the planned route exactly
    OnRoute,

    /// NAV-002: Leave the route and get rerouted
    Detour,

    /// NAV-003: Heavy GPS noise on the planned route
    NoisyFix,

    /// NAV-004: Routing provider fails during a detour
    ProviderOutage,

    /// NAV-005: Simulated playback of the planned route
    Playback,

    /// NAV-006: Location permission denied, then signal loss
    PermissionDenied,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::OnRoute,
            ScenarioId::Detour,
            ScenarioId::NoisyFix,
            ScenarioId::ProviderOutage,
            ScenarioId::Playback,
            ScenarioId::PermissionDenied,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::OnRoute => "on_route",
            ScenarioId::Detour => "detour",
            ScenarioId::NoisyFix => "noisy_fix",
            ScenarioId::ProviderOutage => "provider_outage",
            ScenarioId::Playback => "playback",
            ScenarioId::PermissionDenied => "permission_denied",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::OnRoute => "Drive the planned route; no reroute may fire",
            ScenarioId::Detour => "Swerve 300m off the route; reroutes respect throttle and cooldown",
            ScenarioId::NoisyFix => "8m GPS noise on the planned route; noise alone never reroutes",
            ScenarioId::ProviderOutage => "Provider fails twice mid-detour; old route kept, no retries",
            ScenarioId::Playback => "Replay the route one waypoint per tick until finished",
            ScenarioId::PermissionDenied => "Denied permission is surfaced; signal loss detaches the source",
        }
    }

    /// Returns true if the scenario drives a live location watch.
    pub fn is_live(&self) -> bool {
        !matches!(self, ScenarioId::Playback | ScenarioId::PermissionDenied)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on_route" | "onroute" | "nav-001" => Ok(ScenarioId::OnRoute),
            "detour" | "nav-002" => Ok(ScenarioId::Detour),
            "noisy_fix" | "noisyfix" | "nav-003" => Ok(ScenarioId::NoisyFix),
            "provider_outage" | "provideroutage" | "nav-004" => Ok(ScenarioId::ProviderOutage),
            "playback" | "nav-005" => Ok(ScenarioId::Playback),
            "permission_denied" | "permissiondenied" | "nav-006" => Ok(ScenarioId::PermissionDenied),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
