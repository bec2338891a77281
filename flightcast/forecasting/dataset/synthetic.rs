use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::{
    error::ForecastError,
    point::{Point, Trajectory, TrajectoryId},
};

/// Duration covered by every synthetic flight, in time units.
const FLIGHT_SPAN: f64 = 10.0;

/// Seeded generator of smooth, slightly noisy flights.
///
/// Flight `i` samples `t` evenly over `[0, 10]` and follows
/// `x = 10 sin(0.5 t + phase)`, `y = 8 cos(0.3 t + phase)` with a phase drawn
/// from `[0, 1)` per flight plus Gaussian noise of deviation `noise` on x and y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyntheticFlights {
    /// Number of flights.
    pub trajectories: usize,
    /// Points per flight.
    pub length: usize,
    /// Standard deviation of the positional noise.
    pub noise: f64,
    /// RNG seed; equal seeds give equal datasets.
    pub seed: u64,
}

impl Default for SyntheticFlights {
    fn default() -> Self {
        Self {
            trajectories: 100,
            length: 50,
            noise: 0.1,
            seed: 42,
        }
    }
}

impl SyntheticFlights {
    /// Generates the flights, ids `flight_0`, `flight_1`, ...
    pub fn generate(&self) -> Result<Vec<Trajectory>, ForecastError> {
        if !self.noise.is_finite() || self.noise < 0.0 {
            return Err(ForecastError::Configuration(format!(
                "synthetic noise must be finite and non-negative, got {}",
                self.noise
            )));
        }
        let normal = Normal::new(0.0, self.noise)
            .map_err(|err| ForecastError::Configuration(format!("synthetic noise: {err}")))?;
        let mut rng = SmallRng::seed_from_u64(self.seed);
        (0..self.trajectories)
            .map(|index| {
                let phase: f64 = rng.gen_range(0.0..1.0);
                let points = (0..self.length)
                    .map(|step| {
                        let t = self.time_at(step);
                        let x = (0.5f64).mul_add(t, phase).sin() * 10.0 + normal.sample(&mut rng);
                        let y = (0.3f64).mul_add(t, phase).cos() * 8.0 + normal.sample(&mut rng);
                        Point::new(x, y, t)
                    })
                    .collect();
                Trajectory::new(TrajectoryId::new(format!("flight_{index}")), points)
            })
            .collect()
    }

    #[allow(clippy::cast_precision_loss)]
    fn time_at(&self, step: usize) -> f64 {
        if self.length < 2 {
            0.0
        } else {
            FLIGHT_SPAN * step as f64 / (self.length - 1) as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_flights() {
        let config = SyntheticFlights {
            trajectories: 3,
            length: 20,
            ..SyntheticFlights::default()
        };
        assert_eq!(config.generate().unwrap(), config.generate().unwrap());
        let other = SyntheticFlights { seed: 7, ..config };
        assert_ne!(config.generate().unwrap(), other.generate().unwrap());
    }

    #[test]
    fn time_spans_zero_to_ten() {
        let flights = SyntheticFlights {
            trajectories: 2,
            length: 11,
            ..SyntheticFlights::default()
        }
        .generate()
        .unwrap();
        assert_eq!(flights.len(), 2);
        assert_eq!(flights[1].id().as_str(), "flight_1");
        let times: Vec<f64> = flights[0].points().iter().map(|p| p.t).collect();
        assert_eq!(times.first(), Some(&0.0));
        assert_eq!(times.last(), Some(&10.0));
        assert!((times[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn noiseless_flights_stay_on_the_curves() {
        let flights = SyntheticFlights {
            trajectories: 1,
            length: 30,
            noise: 0.0,
            seed: 3,
        }
        .generate()
        .unwrap();
        for point in flights[0].points() {
            assert!(point.x.abs() <= 10.0 + 1e-9);
            assert!(point.y.abs() <= 8.0 + 1e-9);
        }
    }

    #[test]
    fn phases_fall_in_the_unit_interval() {
        let flights = SyntheticFlights {
            trajectories: 25,
            length: 2,
            noise: 0.0,
            seed: 11,
        }
        .generate()
        .unwrap();
        for flight in &flights {
            let phase = (flight.points()[0].x / 10.0).asin();
            assert!((0.0..1.0).contains(&phase), "phase {phase}");
        }
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn noise_has_unbounded_gaussian_tails() {
        let flights = SyntheticFlights {
            trajectories: 40,
            length: 50,
            noise: 100.0,
            seed: 5,
        }
        .generate()
        .unwrap();
        let xs: Vec<f64> = flights
            .iter()
            .flat_map(|flight| flight.points().iter().map(|p| p.x))
            .collect();
        let count = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / count;
        let std = (xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count).sqrt();
        assert!((90.0..115.0).contains(&std), "std {std}");
        // Past the curve amplitude plus about one deviation.
        let far = xs.iter().filter(|x| x.abs() > 110.0).count() as f64 / count;
        assert!(far > 0.15, "tail share {far}");
    }

    #[test]
    fn rejects_negative_noise() {
        let config = SyntheticFlights {
            noise: -1.0,
            ..SyntheticFlights::default()
        };
        assert!(config.generate().is_err());
    }
}
