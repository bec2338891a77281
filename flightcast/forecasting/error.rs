use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the forecasting core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// Inference window (or training window size) has the wrong cardinality.
    #[error("expected a window of {expected} points, got {actual}")]
    InvalidWindowSize {
        /// Required number of points.
        expected: usize,
        /// Number of points supplied.
        actual: usize,
    },
    /// Kinematic extrapolation was given no points at all.
    #[error("kinematic extrapolation needs at least one point")]
    InsufficientHistory,
    /// Normalization stats or other startup configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Evaluator called without samples.
    #[error("evaluation requires at least one prediction/target pair")]
    EmptyInput,
    /// Predictions and targets differ in length.
    #[error("got {predictions} predictions for {targets} targets")]
    LengthMismatch {
        /// Number of predictions.
        predictions: usize,
        /// Number of targets.
        targets: usize,
    },
    /// A point carries NaN or an infinity.
    #[error("point {index} has a non-finite component")]
    NonFinitePoint {
        /// Position of the offending point in its sequence.
        index: usize,
    },
    /// Array whose trailing axis is not the (x, y, t) feature axis.
    #[error("expected trailing feature axis of length 3, got shape {shape:?}")]
    FeatureShape {
        /// Offending shape.
        shape: Vec<usize>,
    },
}

/// Why the learned forecaster produced no usable estimate.
///
/// Absorbed by the blender; never returned to callers of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForecastUnavailable {
    /// No forecaster attached.
    #[error("no learned forecaster is loaded")]
    NotLoaded,
    /// Forecaster attached but reports itself not ready.
    #[error("forecaster `{0}` is not ready")]
    NotReady(String),
    /// Forecaster returned an error.
    #[error("forecaster failed: {0}")]
    Failed(String),
    /// Forecaster did not answer within the configured bound.
    #[error("forecaster timed out after {0:?}")]
    TimedOut(Duration),
    /// Output tensor had an unexpected shape.
    #[error("forecaster returned malformed shape {0:?}")]
    MalformedShape(Vec<usize>),
    /// Output contained NaN or infinities.
    #[error("forecaster returned non-finite values")]
    NonFinite,
}

impl ForecastUnavailable {
    /// Stable label used in logs and events.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotLoaded => "not_loaded",
            Self::NotReady(_) => "not_ready",
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
            Self::MalformedShape(_) => "malformed_shape",
            Self::NonFinite => "non_finite",
        }
    }
}
