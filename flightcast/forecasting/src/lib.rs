#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! Short-horizon trajectory forecasting: predicts the next (x, y, t) point of
//! a moving object from its last five observations.
//!
//! A kinematic extrapolation is always computed. When a learned forecaster is
//! attached and answers in time, its estimate is blended in; otherwise the
//! kinematic estimate is served alone.

/// Error types.
#[path = "../error.rs"]
pub mod error;

/// Points, trajectories and predictions.
#[path = "../point.rs"]
pub mod point;

/// Per-feature normalization.
#[path = "../normalizer.rs"]
pub mod normalizer;

/// Sliding training windows.
#[path = "../windower.rs"]
pub mod windower;

/// Finite-difference extrapolation.
#[path = "../kinematic.rs"]
pub mod kinematic;

/// Learned forecaster contract and adapter.
#[path = "../adapter/main.rs"]
pub mod adapter;

/// Estimate blending.
#[path = "../blender.rs"]
pub mod blender;

/// Accuracy metrics.
#[path = "../metrics.rs"]
pub mod metrics;

/// TOML configuration.
#[path = "../config.rs"]
pub mod config;

/// Logging and event hooks.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Dataset loading, synthesis and splitting.
#[path = "../dataset/main.rs"]
pub mod dataset;

/// Inference orchestrator.
#[path = "../engine.rs"]
pub mod engine;

/// Offline evaluation runs.
#[path = "../evaluation.rs"]
pub mod evaluation;

pub use adapter::{DenseForecaster, ForecastAdapter, HorizonPolicy, LearnedForecaster};
pub use blender::{BlendWeights, Blender};
pub use config::ForecastConfig;
pub use engine::{EngineHealth, EngineStatus, ForecastEngine, ForecastEngineBuilder};
pub use error::{ForecastError, ForecastUnavailable};
pub use evaluation::{EvaluationRun, OfflineEvaluator};
pub use kinematic::KinematicExtrapolator;
pub use metrics::{EvaluationReport, MetricsEvaluator};
pub use normalizer::{NormalizationStats, Normalizer};
pub use point::{Point, Prediction, Provenance, Trajectory, TrajectoryId};
pub use telemetry::{ForecastTelemetry, ForecastTelemetryBuilder};
pub use windower::{make_windows, TrainingSample, Windower};
