//! Simulated location capability with fault injection.

use async_trait::async_trait;
use epanav_env::{EnvError, LocationCapability, LocationFix, LocationWatch, WatchId};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Fixes buffered per watch before new ones are dropped.
const WATCH_CAPACITY: usize = 256;

#[derive(Default)]
struct LocationState {
    watches: BTreeMap<WatchId, mpsc::Sender<Result<LocationFix, EnvError>>>,
    next_id: u64,
    denied: bool,
    current: Option<LocationFix>,
}

fn lock(state: &Mutex<LocationState>) -> MutexGuard<'_, LocationState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// The device's location capability as seen by the session.
pub struct SimLocation {
    state: Arc<Mutex<LocationState>>,
}

/// Harness side of [`SimLocation`]: moves the device and injects faults.
#[derive(Clone)]
pub struct SimLocationController {
    state: Arc<Mutex<LocationState>>,
}

impl SimLocation {
    /// Creates a capability and the controller that drives it.
    pub fn new() -> (Self, SimLocationController) {
        let state = Arc::new(Mutex::new(LocationState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimLocationController { state },
        )
    }
}

#[async_trait]
impl LocationCapability for SimLocation {
    async fn current_position(&self) -> Result<LocationFix, EnvError> {
        let state = lock(&self.state);
        if state.denied {
            return Err(EnvError::PermissionDenied);
        }
        state
            .current
            .ok_or_else(|| EnvError::PositionUnavailable("no fix acquired yet".to_string()))
    }

    fn watch_position(&self) -> Result<LocationWatch, EnvError> {
        let mut state = lock(&self.state);
        if state.denied {
            return Err(EnvError::PermissionDenied);
        }

        state.next_id += 1;
        let id = WatchId(state.next_id);
        let (tx, rx) = mpsc::channel(WATCH_CAPACITY);
        state.watches.insert(id, tx);
        debug!("Location watch opened ({})", id);
        Ok(LocationWatch::new(id, rx))
    }

    fn clear_watch(&self, id: WatchId) {
        if lock(&self.state).watches.remove(&id).is_some() {
            debug!("Location watch cleared ({})", id);
        }
    }
}

impl SimLocationController {
    /// Moves the device, delivering the fix to every open watch.
    ///
    /// Returns the number of watches that received it.
    pub fn push(&self, fix: LocationFix) -> usize {
        let mut state = lock(&self.state);
        state.current = Some(fix);

        let mut delivered = 0;
        for (id, tx) in &state.watches {
            match tx.try_send(Ok(fix)) {
                Ok(()) => delivered += 1,
                Err(_) => warn!("Fix dropped for {}", id),
            }
        }
        delivered
    }

    /// Revokes location permission. Open watches keep running.
    pub fn deny_permission(&self) {
        lock(&self.state).denied = true;
    }

    pub fn grant_permission(&self) {
        lock(&self.state).denied = false;
    }

    /// Fails every open watch with `PositionUnavailable` and closes it.
    pub fn lose_signal(&self) {
        let mut state = lock(&self.state);
        for (id, tx) in std::mem::take(&mut state.watches) {
            let _ = tx.try_send(Err(EnvError::PositionUnavailable("signal lost".to_string())));
            debug!("Signal lost on {}", id);
        }
    }

    pub fn active_watches(&self) -> usize {
        lock(&self.state).watches.len()
    }

    pub fn current(&self) -> Option<LocationFix> {
        lock(&self.state).current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epanav_env::GeoPoint;

    fn fix(lat: f64) -> LocationFix {
        LocationFix::new(GeoPoint::new(lat, 18.0).unwrap())
    }

    #[tokio::test]
    async fn test_push_reaches_open_watch() {
        let (location, controller) = SimLocation::new();
        let mut watch = location.watch_position().unwrap();

        assert_eq!(controller.push(fix(59.0)), 1);
        assert_eq!(controller.push(fix(59.1)), 1);

        assert_eq!(watch.recv().await, Some(Ok(fix(59.0))));
        assert_eq!(watch.recv().await, Some(Ok(fix(59.1))));
        assert_eq!(location.current_position().await, Ok(fix(59.1)));
    }

    #[tokio::test]
    async fn test_denied_permission() {
        let (location, controller) = SimLocation::new();
        controller.deny_permission();

        assert!(matches!(location.watch_position(), Err(EnvError::PermissionDenied)));
        assert_eq!(location.current_position().await, Err(EnvError::PermissionDenied));

        controller.grant_permission();
        assert!(location.watch_position().is_ok());
    }

    #[tokio::test]
    async fn test_no_fix_yet_is_unavailable() {
        let (location, _controller) = SimLocation::new();
        assert!(matches!(
            location.current_position().await,
            Err(EnvError::PositionUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_lose_signal_fails_and_closes_watches() {
        let (location, controller) = SimLocation::new();
        let mut watch = location.watch_position().unwrap();

        controller.lose_signal();
        assert_eq!(controller.active_watches(), 0);
        assert!(matches!(watch.recv().await, Some(Err(EnvError::PositionUnavailable(_)))));
        assert_eq!(watch.recv().await, None);
        assert_eq!(controller.push(fix(59.0)), 0);
    }

    #[test]
    fn test_clear_watch() {
        let (location, controller) = SimLocation::new();
        let watch = location.watch_position().unwrap();
        assert_eq!(controller.active_watches(), 1);

        location.clear_watch(watch.id());
        assert_eq!(controller.active_watches(), 0);
    }
}
