use std::{fs, path::Path};

use anyhow::{bail, ensure, Context};
use async_trait::async_trait;
use ndarray::{Array1, Array2, Array3, ArrayD};
use serde::Deserialize;

use super::forecaster::LearnedForecaster;
use crate::point::FEATURES;

/// Single affine layer over the flattened normalized window.
///
/// Reference forecaster for demos and tests: maps `window_size * 3` inputs to
/// `horizon * 3` outputs.
#[derive(Debug, Clone)]
pub struct DenseForecaster {
    name: String,
    window_size: usize,
    horizon: usize,
    weights: Array2<f64>,
    bias: Array1<f64>,
}

#[derive(Deserialize)]
struct DenseWeightsFile {
    #[serde(default = "default_name")]
    name: String,
    window_size: usize,
    #[serde(default = "default_horizon")]
    horizon: usize,
    weights: Vec<f64>,
    #[serde(default)]
    bias: Vec<f64>,
}

fn default_name() -> String {
    "dense".into()
}

const fn default_horizon() -> usize {
    1
}

impl DenseForecaster {
    /// Builds a forecaster; `weights` must be `(window_size * 3, horizon * 3)`.
    pub fn new(
        name: impl Into<String>,
        window_size: usize,
        weights: Array2<f64>,
        bias: Array1<f64>,
    ) -> anyhow::Result<Self> {
        ensure!(window_size > 0, "dense forecaster window size must be positive");
        let (rows, cols) = weights.dim();
        ensure!(
            rows == window_size * FEATURES,
            "weight rows {rows} do not match window of {window_size} points"
        );
        ensure!(
            cols > 0 && cols % FEATURES == 0,
            "weight columns {cols} are not a whole number of points"
        );
        ensure!(
            bias.len() == cols,
            "bias length {} does not match {cols} outputs",
            bias.len()
        );
        Ok(Self {
            name: name.into(),
            window_size,
            horizon: cols / FEATURES,
            weights,
            bias,
        })
    }

    /// Loads weights from a JSON file
    /// (`{ "window_size", "horizon", "weights": [row-major], "bias": [] }`).
    pub fn from_weights_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let file: DenseWeightsFile = serde_json::from_str(&contents)
            .with_context(|| format!("parsing dense weights {}", path.display()))?;
        let rows = file.window_size * FEATURES;
        let cols = file.horizon * FEATURES;
        if file.weights.len() != rows * cols {
            bail!(
                "dense weights hold {} values, expected {rows}x{cols}",
                file.weights.len()
            );
        }
        let weights =
            Array2::from_shape_vec((rows, cols), file.weights).context("building weight matrix")?;
        let bias = if file.bias.is_empty() {
            Array1::zeros(cols)
        } else {
            Array1::from_vec(file.bias)
        };
        Self::new(file.name, file.window_size, weights, bias)
    }

    /// Weights that continue the last normalized step at constant velocity.
    ///
    /// Per-feature normalization is affine, so this reproduces two-point
    /// kinematic extrapolation exactly in original units.
    pub fn constant_velocity(window_size: usize) -> anyhow::Result<Self> {
        ensure!(window_size >= 2, "constant velocity needs two points");
        let mut weights = Array2::zeros((window_size * FEATURES, FEATURES));
        let last = (window_size - 1) * FEATURES;
        let previous = (window_size - 2) * FEATURES;
        for feature in 0..FEATURES {
            weights[[last + feature, feature]] = 2.0;
            weights[[previous + feature, feature]] = -1.0;
        }
        Self::new(
            "constant-velocity",
            window_size,
            weights,
            Array1::zeros(FEATURES),
        )
    }

    /// Number of steps emitted per call.
    #[must_use]
    pub const fn horizon(&self) -> usize {
        self.horizon
    }

    /// Expected window length.
    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    fn forward(&self, input: &Array3<f64>) -> anyhow::Result<ArrayD<f64>> {
        let (batch, steps, features) = input.dim();
        ensure!(
            steps == self.window_size && features == FEATURES,
            "input shape {:?} does not match window of {} points",
            input.shape(),
            self.window_size
        );
        let flat = Array2::from_shape_vec(
            (batch, steps * features),
            input.iter().copied().collect(),
        )?;
        let output = flat.dot(&self.weights) + &self.bias;
        let shaped = if self.horizon == 1 {
            output.into_dyn()
        } else {
            output
                .into_shape((batch, self.horizon, FEATURES))?
                .into_dyn()
        };
        Ok(shaped)
    }
}

#[async_trait]
impl LearnedForecaster for DenseForecaster {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, input: Array3<f64>) -> anyhow::Result<ArrayD<f64>> {
        self.forward(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;
    use tempfile::tempdir;

    #[tokio::test]
    async fn constant_velocity_continues_last_step() {
        let model = DenseForecaster::constant_velocity(3).unwrap();
        let input =
            Array3::from_shape_vec((1, 3, 3), vec![0.0, 0.0, 0.0, 1.0, 2.0, 1.0, 2.0, 4.0, 2.0])
                .unwrap();
        let output = model.predict(input).await.unwrap();
        assert_eq!(output.shape(), &[1, 3]);
        assert_eq!(output.iter().copied().collect::<Vec<_>>(), vec![3.0, 6.0, 3.0]);
    }

    #[tokio::test]
    async fn loads_multi_step_weights_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dense.json");
        let rows = 2 * FEATURES;
        let cols = 2 * FEATURES;
        let weights = vec![0.0; rows * cols];
        let payload = serde_json::json!({
            "name": "horizon-two",
            "window_size": 2,
            "horizon": 2,
            "weights": weights,
            "bias": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        });
        fs::write(&path, payload.to_string()).unwrap();
        let model = DenseForecaster::from_weights_file(&path).unwrap();
        assert_eq!(model.name(), "horizon-two");
        assert_eq!(model.horizon(), 2);
        let output = model.predict(Array3::zeros((1, 2, 3))).await.unwrap();
        assert_eq!(output.shape(), &[1, 2, 3]);
        assert_eq!(output[IxDyn(&[0, 1, 2])], 6.0);
    }

    #[test]
    fn rejects_mismatched_weight_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"window_size": 5, "weights": [1.0, 2.0]}"#).unwrap();
        assert!(DenseForecaster::from_weights_file(&path).is_err());
    }

    #[tokio::test]
    async fn rejects_wrong_window_length() {
        let model = DenseForecaster::constant_velocity(5).unwrap();
        assert!(model.predict(Array3::zeros((1, 4, 3))).await.is_err());
    }
}
