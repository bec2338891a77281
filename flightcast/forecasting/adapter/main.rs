//! Bridge between raw windows and a pluggable learned forecaster.
//!
//! Every failure on the learned path is folded into [`ForecastUnavailable`]
//! so the engine can always fall back to the kinematic estimate.

/// Dense reference forecaster.
pub mod dense;
/// Forecaster trait and horizon policy.
pub mod forecaster;

use std::{sync::Arc, time::Duration};

use ndarray::{Array3, ArrayD};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::{runtime::Handle, task, time::timeout};

pub use dense::DenseForecaster;
pub use forecaster::{HorizonPolicy, LearnedForecaster};

use crate::{
    error::ForecastUnavailable,
    normalizer::Normalizer,
    point::{Point, FEATURES},
};

/// Default bound on a single forecaster call.
pub const DEFAULT_FORECAST_TIMEOUT: Duration = Duration::from_millis(250);

/// Snapshot of the forecaster slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecasterStatus {
    /// Name of the attached forecaster, if any.
    pub name: Option<String>,
    /// Whether an attached forecaster reports ready.
    pub ready: bool,
}

/// Normalizes windows, calls the forecaster under a timeout and denormalizes the result.
pub struct ForecastAdapter {
    normalizer: Normalizer,
    forecaster: RwLock<Option<Arc<dyn LearnedForecaster>>>,
    timeout: Duration,
    horizon: HorizonPolicy,
}

impl std::fmt::Debug for ForecastAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastAdapter")
            .field("status", &self.status())
            .field("timeout", &self.timeout)
            .field("horizon", &self.horizon)
            .finish_non_exhaustive()
    }
}

impl ForecastAdapter {
    /// Creates an adapter with an empty forecaster slot.
    #[must_use]
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            forecaster: RwLock::new(None),
            timeout: DEFAULT_FORECAST_TIMEOUT,
            horizon: HorizonPolicy::default(),
        }
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets which step of a multi-step output is used.
    #[must_use]
    pub const fn with_horizon(mut self, horizon: HorizonPolicy) -> Self {
        self.horizon = horizon;
        self
    }

    /// Attaches `forecaster` at construction time.
    #[must_use]
    pub fn with_forecaster(self, forecaster: Arc<dyn LearnedForecaster>) -> Self {
        self.attach(forecaster);
        self
    }

    /// Replaces the forecaster; in-flight calls keep the one they started with.
    pub fn attach(&self, forecaster: Arc<dyn LearnedForecaster>) {
        *self.forecaster.write() = Some(forecaster);
    }

    /// Empties the slot and returns what was there.
    pub fn detach(&self) -> Option<Arc<dyn LearnedForecaster>> {
        self.forecaster.write().take()
    }

    /// Current slot contents.
    #[must_use]
    pub fn status(&self) -> ForecasterStatus {
        let slot = self.forecaster.read();
        ForecasterStatus {
            name: slot.as_ref().map(|f| f.name().to_owned()),
            ready: slot.as_ref().is_some_and(|f| f.is_ready()),
        }
    }

    /// Normalizer shared with the rest of the engine.
    #[must_use]
    pub const fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Configured per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Configured horizon policy.
    #[must_use]
    pub const fn horizon(&self) -> HorizonPolicy {
        self.horizon
    }

    /// Learned estimate of the point after `window`, in original units.
    ///
    /// The call is driven on the blocking pool, so a forecaster that holds its
    /// thread for the whole inference still cannot outlive the timeout. A call
    /// that misses the deadline keeps running there and its result is dropped.
    /// A panic surfaces as [`ForecastUnavailable::Failed`].
    pub async fn forecast(&self, window: &[Point]) -> Result<Point, ForecastUnavailable> {
        let forecaster = self
            .forecaster
            .read()
            .clone()
            .ok_or(ForecastUnavailable::NotLoaded)?;
        if !forecaster.is_ready() {
            return Err(ForecastUnavailable::NotReady(forecaster.name().to_owned()));
        }

        let input = self.input_tensor(window);
        let handle = Handle::current();
        let task = task::spawn_blocking(move || handle.block_on(forecaster.predict(input)));
        let output = match timeout(self.timeout, task).await {
            Err(_) => return Err(ForecastUnavailable::TimedOut(self.timeout)),
            Ok(Err(join)) => return Err(ForecastUnavailable::Failed(join.to_string())),
            Ok(Ok(Err(err))) => return Err(ForecastUnavailable::Failed(format!("{err:#}"))),
            Ok(Ok(Ok(output))) => output,
        };

        let normalized = self.select_step(&output)?;
        if !normalized.is_finite() {
            return Err(ForecastUnavailable::NonFinite);
        }
        let point = self.normalizer.denormalize_point(normalized);
        if point.is_finite() {
            Ok(point)
        } else {
            Err(ForecastUnavailable::NonFinite)
        }
    }

    fn input_tensor(&self, window: &[Point]) -> Array3<f64> {
        let normalized = self.normalizer.normalize_points(window);
        Array3::from_shape_fn((1, normalized.len(), FEATURES), |(_, step, feature)| {
            normalized[step].to_array()[feature]
        })
    }

    fn select_step(&self, output: &ArrayD<f64>) -> Result<Point, ForecastUnavailable> {
        let horizon = match output.shape() {
            [FEATURES] => 1,
            [horizon, FEATURES] | [1, horizon, FEATURES] if *horizon > 0 => *horizon,
            other => return Err(ForecastUnavailable::MalformedShape(other.to_vec())),
        };
        let offset = self.horizon.step(horizon) * FEATURES;
        let value = |feature: usize| {
            output
                .iter()
                .nth(offset + feature)
                .copied()
                .unwrap_or(f64::NAN)
        };
        Ok(Point::new(value(0), value(1), value(2)))
    }
}
