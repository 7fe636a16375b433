//! Simulation context implementing NavContext for deterministic testing.

use async_trait::async_trait;
use epanav_env::NavContext;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::debug;

/// Simulation context backed by deterministic time and RNG.
///
/// This implements `NavContext` using:
/// - A virtual clock that can be advanced manually
/// - Simulated sleep that advances virtual time
/// - Per-subsystem ChaCha8 streams derived from one seed
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Epoch offset (virtual time 0 maps to this wall-clock time)
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs(1_704_067_200), // 2024-01-01 00:00:00 UTC
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        let mut time = self.lock_time();
        *time = time.saturating_add(duration.as_nanos() as u64);
    }

    /// Sets the virtual time to a specific value.
    pub fn set_time(&self, time_ns: u64) {
        *self.lock_time() = time_ns;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.lock_time()
    }

    /// Derives an independent RNG stream for one subsystem.
    ///
    /// The same seed and stream always produce the same sequence, and
    /// streams do not interfere with each other.
    pub fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
        let combined = self.seed.wrapping_mul(0x517c_c1b7_2722_0a95) ^ stream;
        ChaCha8Rng::seed_from_u64(combined)
    }

    fn lock_time(&self) -> std::sync::MutexGuard<'_, u64> {
        match self.virtual_time_ns.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl NavContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Sleeping is what moves the clock
        self.advance_time(duration);
    }

    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!("Spawning {} at t={:?}", name, self.now());
        tokio::spawn(future)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
