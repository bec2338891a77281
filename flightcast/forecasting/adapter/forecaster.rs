use async_trait::async_trait;
use ndarray::{Array3, ArrayD};
use serde::{Deserialize, Serialize};

/// Learned next-point model, seen only through its tensor contract.
///
/// Input is a normalized `(1, window_size, 3)` tensor. Output must be
/// normalized and shaped `(3,)`, `(horizon, 3)` or `(1, horizon, 3)`, where a
/// single step may be written as `(1, 3)`; anything else is treated as
/// unavailable by the adapter.
#[async_trait]
pub trait LearnedForecaster: Send + Sync {
    /// Identifier used in health reports and logs.
    fn name(&self) -> &str;

    /// Whether the model is loaded and able to serve.
    fn is_ready(&self) -> bool {
        true
    }

    /// Runs one forward pass.
    async fn predict(&self, input: Array3<f64>) -> anyhow::Result<ArrayD<f64>>;
}

/// Which step of a multi-step output is used as "the next point".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizonPolicy {
    /// Earliest step of the horizon.
    #[default]
    First,
    /// Final step of the horizon.
    Last,
}

impl HorizonPolicy {
    /// Index of the selected step; `horizon` must be non-zero.
    #[must_use]
    pub const fn step(self, horizon: usize) -> usize {
        match self {
            Self::First => 0,
            Self::Last => horizon - 1,
        }
    }
}
