use serde::{Deserialize, Serialize};

use crate::{error::ForecastError, point::Point};

/// Squared/absolute error summary over some set of scalar components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorSummary {
    /// Mean squared error.
    pub mse: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Square root of `mse`.
    pub rmse: f64,
}

impl ErrorSummary {
    #[allow(clippy::cast_precision_loss)]
    fn from_sums(squared: f64, absolute: f64, count: usize) -> Self {
        let count = count as f64;
        let mse = squared / count;
        Self {
            mse,
            mae: absolute / count,
            rmse: mse.sqrt(),
        }
    }
}

/// Accuracy of predicted points against ground truth, in original units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Number of point pairs evaluated.
    pub samples: usize,
    /// Over all `samples * 3` components.
    pub overall: ErrorSummary,
    /// x component only.
    pub x: ErrorSummary,
    /// y component only.
    pub y: ErrorSummary,
    /// t component only.
    pub t: ErrorSummary,
}

impl EvaluationReport {
    /// Overall mean squared error.
    #[must_use]
    pub const fn mse(&self) -> f64 {
        self.overall.mse
    }

    /// Overall mean absolute error.
    #[must_use]
    pub const fn mae(&self) -> f64 {
        self.overall.mae
    }

    /// Overall root mean squared error.
    #[must_use]
    pub const fn rmse(&self) -> f64 {
        self.overall.rmse
    }

    /// One-line summary for logs and reports.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "[eval] n={} mse={:.6} mae={:.6} rmse={:.6} | x mse={:.6} mae={:.6} | y mse={:.6} mae={:.6} | t mse={:.6} mae={:.6}",
            self.samples,
            self.overall.mse,
            self.overall.mae,
            self.overall.rmse,
            self.x.mse,
            self.x.mae,
            self.y.mse,
            self.y.mae,
            self.t.mse,
            self.t.mae,
        )
    }
}

/// Computes MSE/MAE/RMSE between denormalized predictions and targets.
///
/// Feed it points in original units only; error measured in normalized
/// space has no physical meaning.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsEvaluator;

impl MetricsEvaluator {
    /// Creates the evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Compares `predictions[i]` with `targets[i]` for every `i`.
    pub fn evaluate(
        &self,
        predictions: &[Point],
        targets: &[Point],
    ) -> Result<EvaluationReport, ForecastError> {
        if predictions.len() != targets.len() {
            return Err(ForecastError::LengthMismatch {
                predictions: predictions.len(),
                targets: targets.len(),
            });
        }
        if predictions.is_empty() {
            return Err(ForecastError::EmptyInput);
        }

        let mut squared = [0.0_f64; 3];
        let mut absolute = [0.0_f64; 3];
        for (predicted, target) in predictions.iter().zip(targets) {
            let diff = (*predicted - *target).to_array();
            for (feature, delta) in diff.into_iter().enumerate() {
                squared[feature] += delta * delta;
                absolute[feature] += delta.abs();
            }
        }

        let n = predictions.len();
        let per_feature =
            |feature: usize| ErrorSummary::from_sums(squared[feature], absolute[feature], n);
        Ok(EvaluationReport {
            samples: n,
            overall: ErrorSummary::from_sums(
                squared.iter().sum(),
                absolute.iter().sum(),
                n * squared.len(),
            ),
            x: per_feature(0),
            y: per_feature(1),
            t: per_feature(2),
        })
    }
}
