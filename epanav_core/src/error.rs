//! Error taxonomy for the navigation engine.

use epanav_env::EnvError;
use thiserror::Error;

/// Errors surfaced by the navigation engine.
///
/// None of these are fatal: every one is recoverable at the session level by
/// retrying the user action that triggered it. A reroute dropped because one
/// is already in flight is not an error and is reported as
/// [`RerouteDispatch::Skipped`](crate::reroute::RerouteDispatch::Skipped).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NavError {
    /// An address could not be resolved to a coordinate
    #[error("Could not resolve address: {address}")]
    GeocodeFailure { address: String },

    /// The provider returned no route or failed
    #[error("No route available: {0}")]
    RouteUnavailable(String),

    /// Location permission denied or capability absent
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),

    /// Tracking or simulation requested before a route was loaded
    #[error("No active route")]
    NoActiveRoute,

    /// A lifecycle transition that the current state does not allow
    #[error("Invalid transition from {from}: {action}")]
    InvalidTransition { from: &'static str, action: &'static str },

    /// Environment failure that does not map to a more specific kind
    #[error("Environment error: {0}")]
    Env(EnvError),
}

impl NavError {
    /// Creates a route-unavailable error.
    pub fn route_unavailable(reason: impl Into<String>) -> Self {
        Self::RouteUnavailable(reason.into())
    }

    /// Maps an environment error raised while routing.
    pub fn from_routing(err: EnvError) -> Self {
        Self::RouteUnavailable(err.to_string())
    }
}

impl From<EnvError> for NavError {
    fn from(err: EnvError) -> Self {
        match err {
            EnvError::PermissionDenied | EnvError::PositionUnavailable(_) => {
                Self::LocationUnavailable(err.to_string())
            }
            other => Self::Env(other),
        }
    }
}
