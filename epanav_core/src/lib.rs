//! EPA Navigation Core - Live Navigation and Route-Deviation Engine
//!
//! Tracks a moving agent against a precomputed route, detects when it has
//! strayed, reroutes with rate limiting, and derives a heading for display.
//! Positions come either from the platform location watch or from a
//! deterministic replay of the route itself.
//!
//! All I/O goes through the `epanav_env` traits, so the same session runs
//! against real providers or the simulation harness.

pub mod config;
pub mod deviation;
pub mod display;
pub mod error;
pub mod geo_math;
pub mod heading;
pub mod polyline;
pub mod position;
pub mod reroute;
pub mod route;
pub mod session;
pub mod ticker;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use config::{DeviationConfig, NavigationConfig, RoutingConfig, SimulationConfig};
pub use deviation::{DeviationMonitor, DeviationState, Evaluation};
pub use display::{CameraController, NavigationFrame, NoopCamera};
pub use error::NavError;
pub use heading::HeadingTracker;
pub use polyline::PolylineError;
pub use position::{
    subscribe, LiveSource, PositionSample, PositionSource, SampleSource, SimulatedSource,
    SimulationState, SimulationStatus, Subscription,
};
pub use reroute::{RerouteCoordinator, RerouteDispatch, RerouteTicket};
pub use route::RouteModel;
pub use session::{NavigationSession, PositionUpdate, SessionEvent, SessionMode};
pub use ticker::{Ticker, TimerId};
