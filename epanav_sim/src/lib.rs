//! EPA Navigation Deterministic Simulation Harness
//!
//! This crate provides a controlled environment in which a full
//! `NavigationSession` drives scripted trips reproducibly.
//!
//! # Core Principle: Own Every Source of Non-Determinism
//!
//! - **Time**: Virtual clock that moves only when the harness ticks or a
//!   component sleeps
//! - **Location**: Fixes are pushed by the harness from a ground-truth drive
//! - **Routing**: Scripted provider with injectable faults
//! - **Randomness**: GPS noise derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        SimWorld                          │
//! │  ┌──────────────┐   fixes   ┌───────────────────────┐    │
//! │  │    Oracle    │──────────►│  SimLocation (watch)  │    │
//! │  │ (DrivePlan + │           └──────────┬────────────┘    │
//! │  │  GPS noise)  │                      ▼                 │
//! │  └──────────────┘           ┌───────────────────────┐    │
//! │                             │   NavigationSession   │    │
//! │  ┌──────────────┐ reroutes  │  (deviation, heading, │    │
//! │  │ScriptedRouter│◄─────────►│   reroute, camera)    │    │
//! │  └──────────────┘           └───────────────────────┘    │
//! │              SimContext (virtual clock, seed)            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use epanav_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::Detour);
//! assert!(result.passed);
//! ```

mod context;
mod location;
mod oracle;
mod router;
mod runner;
pub mod scenarios;
mod world;

pub use context::SimContext;
pub use location::{SimLocation, SimLocationController};
pub use oracle::{offset_meters, DrivePlan, Oracle};
pub use router::{densify, ScriptedRouter, SimGeocoder};
pub use runner::{ScenarioFailure, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{
    CameraStats, SimCamera, SimConfig, SimSession, SimWorld, DEPOT_ADDRESS, HARBOUR_ADDRESS,
};
