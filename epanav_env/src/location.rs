//! Location capability abstraction.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::EnvError;
use crate::types::{LocationFix, WatchId};

/// The platform's positioning capability.
///
/// # Implementations
///
/// - **Production**: device GPS / browser geolocation bridge
/// - **Simulation**: `SimLocation`, fed from a ground-truth drive plan
///
/// Both calls may fail with `PermissionDenied` or `PositionUnavailable`.
#[async_trait]
pub trait LocationCapability: Send + Sync + 'static {
    /// One-shot position query.
    async fn current_position(&self) -> Result<LocationFix, EnvError>;

    /// Starts a continuous watch.
    ///
    /// Updates arrive on the returned [`LocationWatch`] in the order the
    /// platform produced them. An `Err` item means the watch has failed;
    /// implementations send nothing after it.
    fn watch_position(&self) -> Result<LocationWatch, EnvError>;

    /// Stops a watch created by [`watch_position`](Self::watch_position).
    ///
    /// Clearing an unknown or already-cleared id is a no-op.
    fn clear_watch(&self, id: WatchId);
}

/// Receiving end of a continuous location watch.
#[derive(Debug)]
pub struct LocationWatch {
    id: WatchId,
    rx: mpsc::Receiver<Result<LocationFix, EnvError>>,
}

impl LocationWatch {
    /// Wraps a channel receiver as a watch.
    pub fn new(id: WatchId, rx: mpsc::Receiver<Result<LocationFix, EnvError>>) -> Self {
        Self { id, rx }
    }

    /// Returns the watch handle.
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Waits for the next update. `None` once the platform closed the watch.
    pub async fn recv(&mut self) -> Option<Result<LocationFix, EnvError>> {
        self.rx.recv().await
    }

    /// Stops accepting updates; anything already queued is discarded.
    pub fn close(&mut self) {
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }
}
