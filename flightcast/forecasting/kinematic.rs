use crate::{error::ForecastError, point::Point};

/// Time advance used when only one point is known.
pub const UNIT_TIME_STEP: f64 = 1.0;

/// Model-free next-point estimator from finite differences.
///
/// Uses the last three points at most:
/// - three or more: constant acceleration, `p3 + v2 + a/2`;
/// - two: constant velocity, `p2 + v`;
/// - one: hold position and advance `t` by [`UNIT_TIME_STEP`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KinematicExtrapolator;

impl KinematicExtrapolator {
    /// Creates the extrapolator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Estimates the point following `history` (most recent last).
    pub fn extrapolate(&self, history: &[Point]) -> Result<Point, ForecastError> {
        match history {
            [] => Err(ForecastError::InsufficientHistory),
            [only] => Ok(Point::new(only.x, only.y, only.t + UNIT_TIME_STEP)),
            [p1, p2] => Ok(*p2 + (*p2 - *p1)),
            [.., p1, p2, p3] => {
                let v1 = *p2 - *p1;
                let v2 = *p3 - *p2;
                let acceleration = v2 - v1;
                Ok(*p3 + v2 + acceleration * 0.5)
            }
        }
    }
}
