use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared_logging::LogLevel;

use crate::{
    adapter::HorizonPolicy,
    blender::BlendWeights,
    error::ForecastError,
    normalizer::NormalizationStats,
    point::INFERENCE_WINDOW,
};

/// Engine settings as stored in TOML.
///
/// ```toml
/// window_size = 5
/// forecaster_timeout_ms = 250
/// horizon = "first"
///
/// [blend]
/// kinematic = 0.7
/// neural = 0.3
///
/// [stats]
/// mean = [0.0, 0.0, 0.0]
/// std = [1.0, 1.0, 1.0]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Points per inference window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Upper bound on one learned-forecaster call.
    #[serde(default = "default_timeout_ms")]
    pub forecaster_timeout_ms: u64,
    /// Step taken from multi-step forecaster outputs.
    #[serde(default)]
    pub horizon: HorizonPolicy,
    /// Optional dense forecaster weights file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecaster_weights: Option<PathBuf>,
    /// Blend weights.
    #[serde(default)]
    pub blend: BlendWeights,
    /// Normalization stats; must match the ones the forecaster was trained with.
    #[serde(default)]
    pub stats: NormalizationStats,
    /// Logging and event sinks.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// Where telemetry goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Module name stamped on records.
    #[serde(default = "default_module")]
    pub module: String,
    /// JSON-lines log file; logging is off when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    /// Lowest level written (`debug`, `info`, `warn`, `error`).
    #[serde(default = "default_min_level")]
    pub min_level: String,
    /// JSON-lines event file; events are off when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_log: Option<PathBuf>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            module: default_module(),
            log_path: None,
            min_level: default_min_level(),
            event_log: None,
        }
    }
}

impl TelemetrySettings {
    /// Parsed minimum level.
    pub fn level(&self) -> Result<LogLevel> {
        self.min_level.parse()
    }
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            forecaster_timeout_ms: default_timeout_ms(),
            horizon: HorizonPolicy::default(),
            blend: BlendWeights::default(),
            stats: NormalizationStats::default(),
            forecaster_weights: None,
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl ForecastConfig {
    /// Reads, validates and resolves relative paths against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading forecast config {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("validating {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let resolve = |candidate: &mut Option<PathBuf>| {
            if let Some(inner) = candidate.as_mut().filter(|p| p.is_relative()) {
                *inner = base.join(&*inner);
            }
        };
        resolve(&mut config.forecaster_weights);
        resolve(&mut config.telemetry.log_path);
        resolve(&mut config.telemetry.event_log);
        Ok(config)
    }

    /// Writes the configuration as TOML, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config dir {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("serializing forecast config")?;
        fs::write(path, raw).with_context(|| format!("writing {}", path.display()))
    }

    /// Rejects settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.window_size != INFERENCE_WINDOW {
            return Err(ForecastError::Configuration(format!(
                "window_size must be {INFERENCE_WINDOW}, got {}",
                self.window_size
            )));
        }
        if self.forecaster_timeout_ms == 0 {
            return Err(ForecastError::Configuration(
                "forecaster_timeout_ms must be positive".into(),
            ));
        }
        self.blend.validate()?;
        self.telemetry
            .level()
            .map_err(|err| ForecastError::Configuration(err.to_string()))?;
        Ok(())
    }

    /// Replaces the stats, e.g. after computing them from a dataset.
    #[must_use]
    pub const fn with_stats(mut self, stats: NormalizationStats) -> Self {
        self.stats = stats;
        self
    }

    /// Forecaster call bound as a [`Duration`].
    #[must_use]
    pub const fn forecaster_timeout(&self) -> Duration {
        Duration::from_millis(self.forecaster_timeout_ms)
    }
}

const fn default_window_size() -> usize {
    INFERENCE_WINDOW
}

const fn default_timeout_ms() -> u64 {
    250
}

fn default_module() -> String {
    "forecasting".into()
}

fn default_min_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_document_uses_defaults() {
        let config: ForecastConfig = toml::from_str("").unwrap();
        assert_eq!(config, ForecastConfig::default());
        assert_eq!(config.stats, NormalizationStats::identity());
        assert_eq!(config.forecaster_timeout(), Duration::from_millis(250));
        config.validate().unwrap();
    }

    #[test]
    fn saved_stats_load_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf/forecast.toml");
        let stats = NormalizationStats::new([1.5, -2.0, 5.0], [0.5, 3.0, 2.5]).unwrap();
        let mut config = ForecastConfig::default().with_stats(stats);
        config.horizon = HorizonPolicy::Last;
        config.save(&path).unwrap();

        let loaded = ForecastConfig::load(&path).unwrap();
        assert_eq!(loaded.stats, stats);
        assert_eq!(loaded.horizon, HorizonPolicy::Last);
    }

    #[test]
    fn relative_paths_follow_the_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forecast.toml");
        fs::write(
            &path,
            "forecaster_weights = \"dense.json\"\n[telemetry]\nlog_path = \"logs/forecast.log\"\n",
        )
        .unwrap();
        let config = ForecastConfig::load(&path).unwrap();
        assert_eq!(config.forecaster_weights, Some(dir.path().join("dense.json")));
        assert_eq!(
            config.telemetry.log_path,
            Some(dir.path().join("logs/forecast.log"))
        );
    }

    #[test]
    fn rejects_zero_std() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forecast.toml");
        fs::write(&path, "[stats]\nmean = [0.0, 0.0, 0.0]\nstd = [1.0, 0.0, 1.0]\n").unwrap();
        assert!(ForecastConfig::load(&path).is_err());
    }

    #[test]
    fn rejects_unusable_settings() {
        let mut config = ForecastConfig {
            window_size: 4,
            ..ForecastConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ForecastError::Configuration(_))
        ));
        config.window_size = 5;
        config.telemetry.min_level = "chatty".into();
        assert!(config.validate().is_err());
        config.telemetry.min_level = "warning".into();
        config.blend.neural = 0.9;
        assert!(config.validate().is_err());
    }
}
