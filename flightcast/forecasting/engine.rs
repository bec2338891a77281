use std::{sync::Arc, time::Duration};

use anyhow::Context;
use serde::Serialize;
use serde_json::json;
use shared_event_bus::{EventPublisher, FileEventPublisher};
use shared_logging::LogLevel;

use crate::{
    adapter::{
        DenseForecaster, ForecastAdapter, ForecasterStatus, HorizonPolicy, LearnedForecaster,
        DEFAULT_FORECAST_TIMEOUT,
    },
    blender::{BlendWeights, Blender},
    config::ForecastConfig,
    error::{ForecastError, ForecastUnavailable},
    kinematic::KinematicExtrapolator,
    normalizer::{NormalizationStats, Normalizer},
    point::{ensure_finite, Point, Prediction, INFERENCE_WINDOW},
    telemetry::{ForecastTelemetry, DEGRADED_EVENT, PREDICTION_EVENT},
};

/// Serving mode reported by [`ForecastEngine::health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// A ready forecaster is attached; predictions can be blended.
    Full,
    /// Predictions are kinematic only.
    KinematicOnly,
}

/// Health snapshot of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineHealth {
    /// Serving mode.
    pub status: EngineStatus,
    /// Forecaster slot.
    pub forecaster: ForecasterStatus,
    /// Points per inference window.
    pub window_size: usize,
    /// Blend weights in effect.
    pub blend: BlendWeights,
}

/// Next-point predictor: kinematic estimate, optional learned estimate, blend.
///
/// Shared by reference across tasks; `predict` never mutates engine state.
#[derive(Debug)]
pub struct ForecastEngine {
    kinematic: KinematicExtrapolator,
    adapter: ForecastAdapter,
    blender: Blender,
    telemetry: ForecastTelemetry,
}

impl ForecastEngine {
    /// Returns a builder with default settings.
    #[must_use]
    pub fn builder() -> ForecastEngineBuilder {
        ForecastEngineBuilder::default()
    }

    /// Builds an engine from a loaded configuration, opening its sinks and weights.
    pub fn from_config(config: &ForecastConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let mut telemetry = ForecastTelemetry::builder(config.telemetry.module.clone())
            .min_level(config.telemetry.level()?);
        if let Some(path) = &config.telemetry.log_path {
            telemetry = telemetry.log_path(path);
        }
        if let Some(path) = &config.telemetry.event_log {
            let publisher: Arc<dyn EventPublisher> = Arc::new(FileEventPublisher::new(path)?);
            telemetry = telemetry.event_publisher(publisher);
        }

        let mut builder = Self::builder()
            .stats(config.stats)
            .blend_weights(config.blend)
            .forecaster_timeout(config.forecaster_timeout())
            .horizon(config.horizon)
            .telemetry(telemetry.build()?);
        if let Some(path) = &config.forecaster_weights {
            let dense = DenseForecaster::from_weights_file(path)
                .with_context(|| format!("loading forecaster weights {}", path.display()))?;
            builder = builder.forecaster(Arc::new(dense));
        }
        Ok(builder.build()?)
    }

    /// Predicts the point following a window of exactly five points.
    ///
    /// Fails only on invalid input; every learned-path problem degrades to
    /// the kinematic estimate.
    pub async fn predict(&self, window: &[Point]) -> Result<Prediction, ForecastError> {
        if window.len() != INFERENCE_WINDOW {
            return Err(ForecastError::InvalidWindowSize {
                expected: INFERENCE_WINDOW,
                actual: window.len(),
            });
        }
        ensure_finite(window)?;

        let kinematic = self.kinematic.extrapolate(window)?;
        let neural = match self.adapter.forecast(window).await {
            Ok(point) => Some(point),
            Err(reason) => {
                self.report_degraded(&reason).await;
                None
            }
        };
        let prediction = self.blender.blend(kinematic, neural);
        self.report_prediction(&prediction).await;
        Ok(prediction)
    }

    /// Predicts `steps` points ahead, feeding each prediction back into the window.
    ///
    /// `seed` needs at least five points; only its last five start the rollout.
    pub async fn rollout(
        &self,
        seed: &[Point],
        steps: usize,
    ) -> Result<Vec<Prediction>, ForecastError> {
        if seed.len() < INFERENCE_WINDOW {
            return Err(ForecastError::InvalidWindowSize {
                expected: INFERENCE_WINDOW,
                actual: seed.len(),
            });
        }
        let mut history = seed[seed.len() - INFERENCE_WINDOW..].to_vec();
        let mut predictions = Vec::with_capacity(steps);
        for _ in 0..steps {
            let window = &history[history.len() - INFERENCE_WINDOW..];
            let prediction = self.predict(window).await?;
            history.push(prediction.point);
            predictions.push(prediction);
        }
        Ok(predictions)
    }

    /// Current serving mode and configuration.
    #[must_use]
    pub fn health(&self) -> EngineHealth {
        let forecaster = self.adapter.status();
        EngineHealth {
            status: if forecaster.ready {
                EngineStatus::Full
            } else {
                EngineStatus::KinematicOnly
            },
            forecaster,
            window_size: INFERENCE_WINDOW,
            blend: self.blender.weights(),
        }
    }

    /// Swaps in a learned forecaster without restarting.
    pub fn attach_forecaster(&self, forecaster: Arc<dyn LearnedForecaster>) {
        let name = forecaster.name().to_owned();
        self.adapter.attach(forecaster);
        self.log(LogLevel::Info, "forecast.attached", json!({ "forecaster": name }));
    }

    /// Removes the learned forecaster; later predictions are kinematic only.
    pub fn detach_forecaster(&self) -> Option<Arc<dyn LearnedForecaster>> {
        let previous = self.adapter.detach();
        if previous.is_some() {
            self.log(LogLevel::Info, "forecast.detached", json!({}));
        }
        previous
    }

    /// Normalizer shared with the learned path.
    #[must_use]
    pub const fn normalizer(&self) -> &Normalizer {
        self.adapter.normalizer()
    }

    /// Telemetry handle.
    #[must_use]
    pub const fn telemetry(&self) -> &ForecastTelemetry {
        &self.telemetry
    }

    async fn report_degraded(&self, reason: &ForecastUnavailable) {
        let level = match reason {
            ForecastUnavailable::NotLoaded => LogLevel::Debug,
            _ => LogLevel::Warn,
        };
        let payload = json!({
            "reason": reason.label(),
            "detail": reason.to_string(),
        });
        self.log(level, DEGRADED_EVENT, payload.clone());
        self.emit(DEGRADED_EVENT, payload).await;
    }

    async fn report_prediction(&self, prediction: &Prediction) {
        let payload = json!({
            "x": prediction.point.x,
            "y": prediction.point.y,
            "t": prediction.point.t,
            "provenance": prediction.provenance.label(),
        });
        self.log(LogLevel::Debug, PREDICTION_EVENT, payload.clone());
        self.emit(PREDICTION_EVENT, payload).await;
    }

    fn log(&self, level: LogLevel, message: &str, metadata: serde_json::Value) {
        if let Err(err) = self.telemetry.log(level, message, metadata) {
            eprintln!("forecast telemetry log failed: {err:?}");
        }
    }

    async fn emit(&self, event_type: &str, payload: serde_json::Value) {
        if let Err(err) = self.telemetry.event(event_type, payload).await {
            eprintln!("forecast telemetry event failed: {err:?}");
        }
    }
}

/// Builder for [`ForecastEngine`].
pub struct ForecastEngineBuilder {
    stats: NormalizationStats,
    blend: BlendWeights,
    timeout: Duration,
    horizon: HorizonPolicy,
    forecaster: Option<Arc<dyn LearnedForecaster>>,
    telemetry: Option<ForecastTelemetry>,
}

impl Default for ForecastEngineBuilder {
    fn default() -> Self {
        Self {
            stats: NormalizationStats::default(),
            blend: BlendWeights::default(),
            timeout: DEFAULT_FORECAST_TIMEOUT,
            horizon: HorizonPolicy::default(),
            forecaster: None,
            telemetry: None,
        }
    }
}

impl ForecastEngineBuilder {
    /// Normalization stats used by the learned path.
    #[must_use]
    pub const fn stats(mut self, stats: NormalizationStats) -> Self {
        self.stats = stats;
        self
    }

    /// Blend weights.
    #[must_use]
    pub const fn blend_weights(mut self, weights: BlendWeights) -> Self {
        self.blend = weights;
        self
    }

    /// Per-call bound on the learned forecaster.
    #[must_use]
    pub const fn forecaster_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Step taken from multi-step forecaster outputs.
    #[must_use]
    pub const fn horizon(mut self, horizon: HorizonPolicy) -> Self {
        self.horizon = horizon;
        self
    }

    /// Learned forecaster attached at startup.
    #[must_use]
    pub fn forecaster(mut self, forecaster: Arc<dyn LearnedForecaster>) -> Self {
        self.forecaster = Some(forecaster);
        self
    }

    /// Logging and event sinks.
    #[must_use]
    pub fn telemetry(mut self, telemetry: ForecastTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Validates settings and assembles the engine.
    pub fn build(self) -> Result<ForecastEngine, ForecastError> {
        if self.timeout.is_zero() {
            return Err(ForecastError::Configuration(
                "forecaster timeout must be positive".into(),
            ));
        }
        let blender = Blender::new(self.blend)?;
        let mut adapter = ForecastAdapter::new(Normalizer::new(Arc::new(self.stats)))
            .with_timeout(self.timeout)
            .with_horizon(self.horizon);
        if let Some(forecaster) = self.forecaster {
            adapter = adapter.with_forecaster(forecaster);
        }
        Ok(ForecastEngine {
            kinematic: KinematicExtrapolator::new(),
            adapter,
            blender,
            telemetry: self
                .telemetry
                .unwrap_or_else(|| ForecastTelemetry::disabled("forecasting")),
        })
    }
}
