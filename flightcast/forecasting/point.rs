use std::{
    fmt,
    ops::{Add, Mul, Sub},
};

use serde::{Deserialize, Serialize};

use crate::error::ForecastError;

/// Number of scalar features per point (x, y, t).
pub const FEATURES: usize = 3;

/// Window length accepted by inference.
pub const INFERENCE_WINDOW: usize = 5;

/// Observed or predicted position with its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
    /// Timestamp.
    pub t: f64,
}

impl Point {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: f64, y: f64, t: f64) -> Self {
        Self { x, y, t }
    }

    /// Features in `[x, y, t]` order.
    #[must_use]
    pub const fn to_array(self) -> [f64; FEATURES] {
        [self.x, self.y, self.t]
    }

    /// Inverse of [`Point::to_array`].
    #[must_use]
    pub const fn from_array(values: [f64; FEATURES]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    /// True when no component is NaN or infinite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.t.is_finite()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x={:.4}, y={:.4}, t={:.4})", self.x, self.y, self.t)
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.t + rhs.t)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.t - rhs.t)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.t * rhs)
    }
}

/// Rejects the first point with a non-finite component.
pub fn ensure_finite(points: &[Point]) -> Result<(), ForecastError> {
    match points.iter().position(|point| !point.is_finite()) {
        Some(index) => Err(ForecastError::NonFinitePoint { index }),
        None => Ok(()),
    }
}

/// Opaque identity shared by the points of one trajectory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrajectoryId(String);

impl TrajectoryId {
    /// Wraps an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TrajectoryId {
    fn default() -> Self {
        Self("default".into())
    }
}

impl fmt::Display for TrajectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Temporally ordered points of one moving object. Order is trusted, never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    id: TrajectoryId,
    points: Vec<Point>,
}

impl Trajectory {
    /// Builds a trajectory, rejecting non-finite points.
    pub fn new(id: TrajectoryId, points: Vec<Point>) -> Result<Self, ForecastError> {
        ensure_finite(&points)?;
        Ok(Self { id, points })
    }

    /// Trajectory identity.
    #[must_use]
    pub const fn id(&self) -> &TrajectoryId {
        &self.id
    }

    /// Points in caller-supplied order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the trajectory has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Strategy that produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Kinematic extrapolation only.
    Kinematic,
    /// Learned forecaster only.
    Neural,
    /// Weighted kinematic + learned estimate.
    Blended,
}

impl Provenance {
    /// Stable label for logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Kinematic => "kinematic",
            Self::Neural => "neural",
            Self::Blended => "blended",
        }
    }
}

/// Final predicted point tagged with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted next point.
    pub point: Point,
    /// Strategy used.
    pub provenance: Provenance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_is_componentwise() {
        let a = Point::new(1.0, 2.0, 3.0);
        let b = Point::new(0.5, 0.5, 1.0);
        assert_eq!(a + b, Point::new(1.5, 2.5, 4.0));
        assert_eq!(a - b, Point::new(0.5, 1.5, 2.0));
        assert_eq!(a * 2.0, Point::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn trajectory_rejects_non_finite_points() {
        let err = Trajectory::new(
            TrajectoryId::new("7"),
            vec![Point::new(0.0, 0.0, 0.0), Point::new(f64::NAN, 1.0, 1.0)],
        )
        .unwrap_err();
        assert_eq!(err, ForecastError::NonFinitePoint { index: 1 });
    }

    #[test]
    fn point_serializes_as_flat_object() {
        let json = serde_json::to_value(Point::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(json, serde_json::json!({ "x": 1.0, "y": 2.0, "t": 3.0 }));
    }
}
