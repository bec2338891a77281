use std::sync::Arc;

use ndarray::{Array, ArrayBase, Axis, Data, Dimension};
use serde::{Deserialize, Serialize};

use crate::{
    error::ForecastError,
    point::{ensure_finite, Point, Trajectory, FEATURES},
};

/// Per-feature mean and standard deviation for (x, y, t).
///
/// Every `std` entry is finite and strictly positive; both constructors and
/// deserialization enforce it, so dividing by `std` is always defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StatsRepr")]
pub struct NormalizationStats {
    mean: [f64; FEATURES],
    std: [f64; FEATURES],
}

#[derive(Deserialize)]
struct StatsRepr {
    mean: [f64; FEATURES],
    std: [f64; FEATURES],
}

impl TryFrom<StatsRepr> for NormalizationStats {
    type Error = ForecastError;

    fn try_from(raw: StatsRepr) -> Result<Self, Self::Error> {
        Self::new(raw.mean, raw.std)
    }
}

impl NormalizationStats {
    /// Validates explicitly supplied stats (e.g. loaded from configuration).
    pub fn new(mean: [f64; FEATURES], std: [f64; FEATURES]) -> Result<Self, ForecastError> {
        if let Some(feature) = mean.iter().position(|value| !value.is_finite()) {
            return Err(ForecastError::Configuration(format!(
                "normalization mean[{feature}] is not finite"
            )));
        }
        if let Some(feature) = std
            .iter()
            .position(|value| !value.is_finite() || *value <= 0.0)
        {
            return Err(ForecastError::Configuration(format!(
                "normalization std[{feature}] must be finite and positive, got {}",
                std[feature]
            )));
        }
        Ok(Self { mean, std })
    }

    /// Zero mean, unit deviation.
    #[must_use]
    pub const fn identity() -> Self {
        Self {
            mean: [0.0; FEATURES],
            std: [1.0; FEATURES],
        }
    }

    /// Population mean/std over `points`; a deviation of exactly zero becomes 1.0.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_points(points: &[Point]) -> Result<Self, ForecastError> {
        if points.is_empty() {
            return Err(ForecastError::EmptyInput);
        }
        ensure_finite(points)?;
        let count = points.len() as f64;
        let mut mean = [0.0; FEATURES];
        for point in points {
            for (acc, value) in mean.iter_mut().zip(point.to_array()) {
                *acc += value;
            }
        }
        for acc in &mut mean {
            *acc /= count;
        }

        let mut std = [0.0; FEATURES];
        for point in points {
            for (feature, value) in point.to_array().into_iter().enumerate() {
                std[feature] += (value - mean[feature]).powi(2);
            }
        }
        for deviation in &mut std {
            *deviation = (*deviation / count).sqrt();
            if *deviation == 0.0 {
                *deviation = 1.0;
            }
        }
        Ok(Self { mean, std })
    }

    /// Stats over every point of every trajectory.
    pub fn from_trajectories(trajectories: &[Trajectory]) -> Result<Self, ForecastError> {
        let points: Vec<Point> = trajectories
            .iter()
            .flat_map(|trajectory| trajectory.points().iter().copied())
            .collect();
        Self::from_points(&points)
    }

    /// Feature means.
    #[must_use]
    pub const fn mean(&self) -> [f64; FEATURES] {
        self.mean
    }

    /// Feature deviations.
    #[must_use]
    pub const fn std(&self) -> [f64; FEATURES] {
        self.std
    }
}

impl Default for NormalizationStats {
    fn default() -> Self {
        Self::identity()
    }
}

/// Affine (x, y, t) transform shared by training and inference.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stats: Arc<NormalizationStats>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(NormalizationStats::identity()))
    }
}

impl Normalizer {
    /// Wraps shared, immutable stats.
    #[must_use]
    pub fn new(stats: Arc<NormalizationStats>) -> Self {
        debug_assert!(stats.std.iter().all(|value| *value > 0.0));
        Self { stats }
    }

    /// Stats backing this transform.
    #[must_use]
    pub fn stats(&self) -> &Arc<NormalizationStats> {
        &self.stats
    }

    /// `(v - mean) / std` for one point.
    #[must_use]
    pub fn normalize_point(&self, point: Point) -> Point {
        let mut values = point.to_array();
        for (feature, value) in values.iter_mut().enumerate() {
            *value = self.forward(*value, feature);
        }
        Point::from_array(values)
    }

    /// `v * std + mean` for one point.
    #[must_use]
    pub fn denormalize_point(&self, point: Point) -> Point {
        let mut values = point.to_array();
        for (feature, value) in values.iter_mut().enumerate() {
            *value = self.inverse(*value, feature);
        }
        Point::from_array(values)
    }

    /// Normalizes a sequence of points.
    #[must_use]
    pub fn normalize_points(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|p| self.normalize_point(*p)).collect()
    }

    /// Denormalizes a sequence of points.
    #[must_use]
    pub fn denormalize_points(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|p| self.denormalize_point(*p)).collect()
    }

    /// Normalizes any array whose last axis holds the (x, y, t) features.
    pub fn normalize_array<S, D>(
        &self,
        values: &ArrayBase<S, D>,
    ) -> Result<Array<f64, D>, ForecastError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        map_features(values, |value, feature| self.forward(value, feature))
    }

    /// Inverse of [`Normalizer::normalize_array`].
    pub fn denormalize_array<S, D>(
        &self,
        values: &ArrayBase<S, D>,
    ) -> Result<Array<f64, D>, ForecastError>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        map_features(values, |value, feature| self.inverse(value, feature))
    }

    fn forward(&self, value: f64, feature: usize) -> f64 {
        (value - self.stats.mean[feature]) / self.stats.std[feature]
    }

    fn inverse(&self, value: f64, feature: usize) -> f64 {
        value.mul_add(self.stats.std[feature], self.stats.mean[feature])
    }
}

fn map_features<S, D>(
    values: &ArrayBase<S, D>,
    apply: impl Fn(f64, usize) -> f64,
) -> Result<Array<f64, D>, ForecastError>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let axis = values
        .ndim()
        .checked_sub(1)
        .filter(|&last| values.len_of(Axis(last)) == FEATURES)
        .ok_or_else(|| ForecastError::FeatureShape {
            shape: values.shape().to_vec(),
        })?;
    let mut out = values.to_owned();
    for mut lane in out.lanes_mut(Axis(axis)) {
        for (feature, value) in lane.iter_mut().enumerate() {
            *value = apply(*value, feature);
        }
    }
    Ok(out)
}
