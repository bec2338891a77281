use std::slice;

use ndarray::{Array2, Array3};

use crate::{
    error::ForecastError,
    normalizer::Normalizer,
    point::{Point, Trajectory, TrajectoryId, FEATURES},
};

/// One supervised pair: `window_size` consecutive points and the point that follows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample<'a> {
    /// Trajectory the window was cut from.
    pub trajectory_id: &'a TrajectoryId,
    /// Input window, oldest first.
    pub window: &'a [Point],
    /// Point immediately after the window.
    pub target: Point,
}

/// Dense training tensors handed to an external training loop.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingTensors {
    /// Shape `(samples, window_size, 3)`.
    pub inputs: Array3<f64>,
    /// Shape `(samples, 3)`.
    pub targets: Array2<f64>,
}

impl TrainingTensors {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.nrows()
    }

    /// Whether there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cuts trajectories into sliding (window, target) pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windower {
    window_size: usize,
}

impl Windower {
    /// Creates a windower; a zero-length window is rejected.
    pub fn new(window_size: usize) -> Result<Self, ForecastError> {
        if window_size == 0 {
            return Err(ForecastError::Configuration(
                "window size must be at least 1".into(),
            ));
        }
        Ok(Self { window_size })
    }

    /// Configured window length.
    #[must_use]
    pub const fn window_size(&self) -> usize {
        self.window_size
    }

    /// Lazily yields every sample, trajectory by trajectory, in input order.
    ///
    /// Each call starts a fresh pass; nothing is shared between iterators.
    #[must_use]
    pub fn windows<'a>(&self, trajectories: &'a [Trajectory]) -> Windows<'a> {
        Windows {
            trajectories: trajectories.iter(),
            current: None,
            span: self.window_size + 1,
        }
    }

    /// `sum(max(0, len - window_size))` without materializing samples.
    #[must_use]
    pub fn count(&self, trajectories: &[Trajectory]) -> usize {
        trajectories
            .iter()
            .map(|trajectory| trajectory.len().saturating_sub(self.window_size))
            .sum()
    }

    /// Packs samples into dense tensors, optionally normalizing both sides.
    pub fn to_tensors<'a>(
        &self,
        samples: impl IntoIterator<Item = TrainingSample<'a>>,
        normalizer: Option<&Normalizer>,
    ) -> Result<TrainingTensors, ForecastError> {
        let samples: Vec<TrainingSample<'a>> = samples.into_iter().collect();
        let mut inputs = Array3::zeros((samples.len(), self.window_size, FEATURES));
        let mut targets = Array2::zeros((samples.len(), FEATURES));
        for (row, sample) in samples.iter().enumerate() {
            if sample.window.len() != self.window_size {
                return Err(ForecastError::InvalidWindowSize {
                    expected: self.window_size,
                    actual: sample.window.len(),
                });
            }
            for (step, point) in sample.window.iter().enumerate() {
                for (feature, value) in point.to_array().into_iter().enumerate() {
                    inputs[[row, step, feature]] = value;
                }
            }
            for (feature, value) in sample.target.to_array().into_iter().enumerate() {
                targets[[row, feature]] = value;
            }
        }
        if let Some(normalizer) = normalizer {
            inputs = normalizer.normalize_array(&inputs)?;
            targets = normalizer.normalize_array(&targets)?;
        }
        Ok(TrainingTensors { inputs, targets })
    }
}

/// Shorthand for `Windower::new(window_size)?.windows(trajectories)`.
pub fn make_windows(
    trajectories: &[Trajectory],
    window_size: usize,
) -> Result<Windows<'_>, ForecastError> {
    Ok(Windower::new(window_size)?.windows(trajectories))
}

/// Iterator returned by [`Windower::windows`].
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    trajectories: slice::Iter<'a, Trajectory>,
    current: Option<(&'a TrajectoryId, slice::Windows<'a, Point>)>,
    span: usize,
}

impl<'a> Iterator for Windows<'a> {
    type Item = TrainingSample<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((id, chunks)) = self.current.as_mut() {
                if let Some((target, window)) = chunks.next().and_then(<[Point]>::split_last) {
                    return Some(TrainingSample {
                        trajectory_id: *id,
                        window,
                        target: *target,
                    });
                }
            }
            let trajectory = self.trajectories.next()?;
            self.current = Some((trajectory.id(), trajectory.points().windows(self.span)));
        }
    }
}
