//! EPA Navigation Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" seams that let the navigation engine
//! run against **Reality** (tokio clock, device GPS, a hosted routing API)
//! and **Simulation** (virtual clock, scripted GPS and routing) unchanged.
//!
//! # Intercepted I/O
//!
//! - Time (`now()`, `sleep()`)
//! - Location (`current_position()`, `watch_position()`, `clear_watch()`)
//! - Routing and geocoding (`compute_route()`, `resolve()`)
//!
//! # Example
//!
//! ```ignore
//! use epanav_env::{NavContext, LocationCapability};
//!
//! async fn follow<Ctx: NavContext, Loc: LocationCapability>(ctx: &Ctx, loc: &Loc) {
//!     let mut watch = loc.watch_position().expect("watch");
//!     while let Some(Ok(fix)) = watch.recv().await {
//!         println!("{:?} at {:?}", fix.point, ctx.now());
//!     }
//! }
//! ```

mod context;
mod error;
mod location;
mod routing;
mod tokio_impl;
mod types;

pub use context::NavContext;
pub use error::EnvError;
pub use location::{LocationCapability, LocationWatch};
pub use routing::{
    DirectionsRequest, DirectionsResponse, Geocoder, ProviderRoute, RouteLegSummary,
    RoutePreference, RoutingProvider,
};
pub use tokio_impl::TokioContext;
pub use types::{GeoPoint, LocationFix, WatchId};
