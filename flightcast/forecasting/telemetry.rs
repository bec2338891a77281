use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord};

/// Event emitted for every served prediction.
pub const PREDICTION_EVENT: &str = "forecast.prediction";
/// Event emitted whenever the learned path was skipped.
pub const DEGRADED_EVENT: &str = "forecast.degraded";

/// Builder for forecasting telemetry sinks.
pub struct ForecastTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    min_level: LogLevel,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl ForecastTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            min_level: LogLevel::Info,
            event_publisher: None,
        }
    }

    /// Sets the JSON-lines log path.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Sets the lowest level written to the log.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds the telemetry handle, opening the log file if one was set.
    pub fn build(self) -> Result<ForecastTelemetry> {
        let logger = self
            .log_path
            .map(|path| JsonLogger::with_min_level(path, self.min_level))
            .transpose()?;
        Ok(ForecastTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
                publisher: self.event_publisher,
            }),
        })
    }
}

/// Cloneable logging and event handle. Both sinks are optional.
#[derive(Clone)]
pub struct ForecastTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for ForecastTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecastTelemetry")
            .field("module", &self.inner.module)
            .field("logging", &self.inner.logger.is_some())
            .field("events", &self.inner.publisher.is_some())
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<JsonLogger>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl ForecastTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> ForecastTelemetryBuilder {
        ForecastTelemetryBuilder::new(module)
    }

    /// Handle that drops everything.
    #[must_use]
    pub fn disabled(module: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                module: module.into(),
                logger: None,
                publisher: None,
            }),
        }
    }

    /// Component name stamped on records and events.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.inner.module
    }

    /// Writes one structured log record.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Publishes an event on the configured bus.
    pub async fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if let Some(publisher) = &self.inner.publisher {
            publisher
                .publish(EventRecord::new(&self.inner.module, event_type, payload))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_event_bus::MemoryEventBus;
    use shared_logging::read_records;
    use tempfile::tempdir;

    #[tokio::test]
    async fn writes_logs_and_events() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("forecast.log");
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = ForecastTelemetry::builder("forecasting.engine")
            .log_path(&log_path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();

        telemetry
            .log(LogLevel::Warn, DEGRADED_EVENT, json!({"reason": "timed_out"}))
            .unwrap();
        telemetry
            .event(DEGRADED_EVENT, json!({"reason": "timed_out"}))
            .await
            .unwrap();

        let records = read_records(&log_path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module, "forecasting.engine");
        assert_eq!(records[0].metadata["reason"], "timed_out");

        let events = bus.of_type(DEGRADED_EVENT);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, "forecasting.engine");
    }

    #[test]
    fn respects_minimum_level() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("forecast.log");
        let telemetry = ForecastTelemetry::builder("forecasting")
            .log_path(&log_path)
            .min_level(LogLevel::Warn)
            .build()
            .unwrap();
        telemetry.log(LogLevel::Info, "quiet", Value::Null).unwrap();
        telemetry.log(LogLevel::Error, "loud", Value::Null).unwrap();
        let records = read_records(&log_path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "loud");
    }

    #[tokio::test]
    async fn disabled_handle_is_silent() {
        let telemetry = ForecastTelemetry::disabled("forecasting");
        telemetry.log(LogLevel::Error, "dropped", Value::Null).unwrap();
        telemetry.event(PREDICTION_EVENT, Value::Null).await.unwrap();
        assert_eq!(telemetry.module(), "forecasting");
    }
}
