use serde::{Deserialize, Serialize};

use crate::{
    error::ForecastError,
    point::{Point, Prediction, Provenance},
};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Fixed weights applied when both estimates are present. Kinematic-dominant by default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    /// Weight of the kinematic estimate.
    #[serde(default = "default_kinematic_weight")]
    pub kinematic: f64,
    /// Weight of the learned estimate.
    #[serde(default = "default_neural_weight")]
    pub neural: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            kinematic: default_kinematic_weight(),
            neural: default_neural_weight(),
        }
    }
}

impl BlendWeights {
    /// Checks the weights are finite, non-negative and sum to one.
    pub fn validate(&self) -> Result<(), ForecastError> {
        let finite = self.kinematic.is_finite() && self.neural.is_finite();
        if !finite || self.kinematic < 0.0 || self.neural < 0.0 {
            return Err(ForecastError::Configuration(format!(
                "blend weights must be finite and non-negative, got {}/{}",
                self.kinematic, self.neural
            )));
        }
        if (self.kinematic + self.neural - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ForecastError::Configuration(format!(
                "blend weights must sum to 1, got {}",
                self.kinematic + self.neural
            )));
        }
        Ok(())
    }
}

const fn default_kinematic_weight() -> f64 {
    0.7
}

const fn default_neural_weight() -> f64 {
    0.3
}

/// Combines the always-present kinematic estimate with an optional learned one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Blender {
    weights: BlendWeights,
}

impl Blender {
    /// Creates a blender with validated weights.
    pub fn new(weights: BlendWeights) -> Result<Self, ForecastError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Weights in effect.
    #[must_use]
    pub const fn weights(&self) -> BlendWeights {
        self.weights
    }

    /// Kinematic alone when `neural` is absent, weighted sum otherwise.
    #[must_use]
    pub fn blend(&self, kinematic: Point, neural: Option<Point>) -> Prediction {
        match neural {
            None => Prediction {
                point: kinematic,
                provenance: Provenance::Kinematic,
            },
            Some(neural) => Prediction {
                point: kinematic * self.weights.kinematic + neural * self.weights.neural,
                provenance: Provenance::Blended,
            },
        }
    }
}
