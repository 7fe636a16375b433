//! Ground truth oracle for simulation.
//!
//! The Oracle maintains the "God's eye view" of the drive:
//! - Where the vehicle really is at any virtual time (`DrivePlan`)
//! - What the GPS reports for that position (Gaussian noise)

use epanav_core::geo_math::{distance_meters, EARTH_RADIUS_M};
use epanav_env::{GeoPoint, LocationFix};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, NormalError};
use std::time::Duration;

use crate::router::lerp;

/// The path the vehicle actually drives, at constant speed.
#[derive(Debug, Clone)]
pub struct DrivePlan {
    path: Vec<GeoPoint>,

    /// Distance from the start to each vertex of `path`
    cumulative_m: Vec<f64>,

    speed_mps: f64,
}

impl DrivePlan {
    /// Creates a plan along `path`. An empty path parks the vehicle at the origin.
    pub fn new(path: Vec<GeoPoint>, speed_kmh: f64) -> Self {
        let mut cumulative_m = Vec::with_capacity(path.len());
        let mut total = 0.0;
        for (i, point) in path.iter().enumerate() {
            if i > 0 {
                total += distance_meters(path[i - 1], *point);
            }
            cumulative_m.push(total);
        }

        Self {
            path,
            cumulative_m,
            speed_mps: speed_kmh.max(0.0) / 3.6,
        }
    }

    /// Drives straight along the planned route.
    pub fn straight(from: GeoPoint, to: GeoPoint, speed_kmh: f64) -> Self {
        Self::new(vec![from, to], speed_kmh)
    }

    /// Drives through `via` instead of going straight.
    pub fn with_detour(from: GeoPoint, via: GeoPoint, to: GeoPoint, speed_kmh: f64) -> Self {
        Self::new(vec![from, via, to], speed_kmh)
    }

    pub fn length_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }

    /// Time needed to reach the end of the path.
    pub fn duration(&self) -> Duration {
        if self.speed_mps <= 0.0 {
            return Duration::MAX;
        }
        Duration::from_secs_f64(self.length_m() / self.speed_mps)
    }

    pub fn is_finished(&self, t: Duration) -> bool {
        t >= self.duration()
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        self.path.last().copied()
    }

    /// True position at virtual time `t`.
    pub fn position_at(&self, t: Duration) -> Option<GeoPoint> {
        let first = *self.path.first()?;
        let travelled = (self.speed_mps * t.as_secs_f64()).min(self.length_m());

        let leg = self
            .cumulative_m
            .windows(2)
            .position(|w| travelled <= w[1])
            .unwrap_or(0);
        let (a, b) = match (self.path.get(leg), self.path.get(leg + 1)) {
            (Some(a), Some(b)) => (*a, *b),
            _ => return Some(first),
        };

        let leg_len = self.cumulative_m[leg + 1] - self.cumulative_m[leg];
        if leg_len <= 0.0 {
            return Some(a);
        }
        let fraction = (travelled - self.cumulative_m[leg]) / leg_len;
        Some(lerp(a, b, fraction).unwrap_or(a))
    }
}

/// Moves `point` by the given offsets in meters.
pub fn offset_meters(point: GeoPoint, north_m: f64, east_m: f64) -> GeoPoint {
    let lat = point.latitude() + (north_m / EARTH_RADIUS_M).to_degrees();
    let cos_lat = point.latitude().to_radians().cos().max(1e-6);
    let lon = point.longitude() + (east_m / (EARTH_RADIUS_M * cos_lat)).to_degrees();

    GeoPoint::new(lat.clamp(-90.0, 90.0), (lon + 180.0).rem_euclid(360.0) - 180.0).unwrap_or(point)
}

/// The Oracle - knows the truth and produces GPS fixes from it.
pub struct Oracle {
    plan: DrivePlan,

    /// RNG for GPS noise (derived from the context's seed)
    rng: ChaCha8Rng,

    noise: Option<Normal<f64>>,

    /// Noise standard deviation (meters), reported as fix accuracy
    noise_std_m: f64,
}

impl Oracle {
    /// Creates an Oracle with perfect GPS.
    pub fn new(plan: DrivePlan, rng: ChaCha8Rng) -> Self {
        Self {
            plan,
            rng,
            noise: None,
            noise_std_m: 0.0,
        }
    }

    /// Adds Gaussian noise to every fix (per axis, meters).
    pub fn with_noise(mut self, std_dev_m: f64) -> Result<Self, NormalError> {
        self.noise = if std_dev_m > 0.0 {
            Some(Normal::new(0.0, std_dev_m)?)
        } else {
            None
        };
        self.noise_std_m = std_dev_m.max(0.0);
        Ok(self)
    }

    pub fn plan(&self) -> &DrivePlan {
        &self.plan
    }

    /// True position at `t`.
    pub fn truth_at(&self, t: Duration) -> Option<GeoPoint> {
        self.plan.position_at(t)
    }

    /// The GPS fix reported at `t`.
    pub fn observe(&mut self, t: Duration) -> Option<LocationFix> {
        let truth = self.truth_at(t)?;
        let point = match &self.noise {
            Some(normal) => {
                let north = normal.sample(&mut self.rng);
                let east = normal.sample(&mut self.rng);
                offset_meters(truth, north, east)
            }
            None => truth,
        };
        Some(LocationFix::new(point).with_accuracy(self.noise_std_m.max(3.0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    fn north_km() -> DrivePlan {
        DrivePlan::straight(p(59.0, 18.0), offset_meters(p(59.0, 18.0), 1_000.0, 0.0), 36.0)
    }

    #[test]
    fn test_drive_plan_timing() {
        let plan = north_km();
        assert!((plan.length_m() - 1_000.0).abs() < 1e-6);
        assert!((plan.duration().as_secs_f64() - 100.0).abs() < 1e-6);
        assert!(!plan.is_finished(Duration::from_secs(99)));
        assert!(plan.is_finished(Duration::from_secs(100)));
    }

    #[test]
    fn test_drive_plan_positions() {
        let plan = north_km();
        let start = plan.position_at(Duration::ZERO).unwrap();
        let middle = plan.position_at(Duration::from_secs(50)).unwrap();
        let past_end = plan.position_at(Duration::from_secs(500)).unwrap();

        assert_eq!(start, p(59.0, 18.0));
        assert!((distance_meters(start, middle) - 500.0).abs() < 1.0);
        assert!(distance_meters(past_end, plan.destination().unwrap()) < 1e-6);
    }

    #[test]
    fn test_detour_leaves_the_straight_line() {
        let from = p(59.0, 18.0);
        let to = offset_meters(from, 2_000.0, 0.0);
        let via = offset_meters(from, 1_000.0, 300.0);
        let plan = DrivePlan::with_detour(from, via, to, 30.0);

        let halfway = plan.duration() / 2;
        let at_via = plan.position_at(halfway).unwrap();
        assert!(distance_meters(at_via, via) < 5.0);
        assert!(plan.length_m() > 2_000.0);
    }

    #[test]
    fn test_empty_plan_has_no_position() {
        let plan = DrivePlan::new(Vec::new(), 30.0);
        assert_eq!(plan.position_at(Duration::from_secs(1)), None);
    }

    #[test]
    fn test_offset_meters() {
        let origin = p(59.0, 18.0);
        assert!((distance_meters(origin, offset_meters(origin, 0.0, 250.0)) - 250.0).abs() < 0.1);
        assert!((distance_meters(origin, offset_meters(origin, -40.0, 0.0)) - 40.0).abs() < 1e-6);
    }

    #[test]
    fn test_oracle_deterministic_noise() {
        let mut oracle1 = Oracle::new(north_km(), ChaCha8Rng::seed_from_u64(42))
            .with_noise(5.0)
            .unwrap();
        let mut oracle2 = Oracle::new(north_km(), ChaCha8Rng::seed_from_u64(42))
            .with_noise(5.0)
            .unwrap();

        let t = Duration::from_secs(10);
        assert_eq!(oracle1.observe(t), oracle2.observe(t));
    }

    #[test]
    fn test_noise_is_centered_on_truth() {
        let mut oracle = Oracle::new(north_km(), ChaCha8Rng::seed_from_u64(7))
            .with_noise(5.0)
            .unwrap();
        let t = Duration::from_secs(30);
        let truth = oracle.truth_at(t).unwrap();

        let n = 2_000;
        let mean_error: f64 = (0..n)
            .map(|_| distance_meters(truth, oracle.observe(t).unwrap().point))
            .sum::<f64>()
            / n as f64;

        // Mean of a Rayleigh(5) distribution is ~6.27 m
        assert!(mean_error > 5.0 && mean_error < 7.5);
    }

    #[test]
    fn test_perfect_gps_reports_truth() {
        let mut oracle = Oracle::new(north_km(), ChaCha8Rng::seed_from_u64(1));
        let t = Duration::from_secs(20);
        assert_eq!(oracle.observe(t).unwrap().point, oracle.truth_at(t).unwrap());
        assert!(Oracle::new(north_km(), ChaCha8Rng::seed_from_u64(1)).with_noise(-1.0).is_ok());
    }
}
