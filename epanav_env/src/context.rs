//! Core environment context trait for the navigation engine.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// The central interface for clock and task interaction.
///
/// This trait abstracts the "real world" so that the navigation session can
/// run on a live device (tokio) and inside the deterministic harness.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`
/// - **Simulation**: `SimContext` - virtual clock advanced by the harness
///
/// # Determinism
///
/// Every timestamp the engine uses (sample time, throttle and cooldown
/// windows, route creation time) comes from `now()`, so a simulated run is
/// reproducible from its seed.
#[async_trait]
pub trait NavContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// All engine timestamps are expressed on this clock.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time (for logs and exports).
    fn system_time(&self) -> SystemTime;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task; aborting the handle cancels it.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
