use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    dataset::{holdout_tail, DEFAULT_HOLDOUT_FRACTION},
    engine::ForecastEngine,
    error::ForecastError,
    metrics::{EvaluationReport, MetricsEvaluator},
    point::{Point, Provenance, Trajectory, INFERENCE_WINDOW},
    windower::{TrainingSample, Windower},
};

/// How many predictions come from each strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProvenanceCounts {
    /// Kinematic-only predictions.
    pub kinematic: usize,
    /// Learned-only predictions.
    pub neural: usize,
    /// Blended predictions.
    pub blended: usize,
}

impl ProvenanceCounts {
    fn record(&mut self, provenance: Provenance) {
        match provenance {
            Provenance::Kinematic => self.kinematic += 1,
            Provenance::Neural => self.neural += 1,
            Provenance::Blended => self.blended += 1,
        }
    }
}

/// Result of one offline evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRun {
    /// Run identifier.
    pub id: Uuid,
    /// When the run finished.
    pub completed_at: DateTime<Utc>,
    /// Samples that were not evaluated.
    pub training_samples: usize,
    /// Accuracy on the held-out samples.
    pub report: EvaluationReport,
    /// Strategy breakdown of the held-out predictions.
    pub provenance: ProvenanceCounts,
}

/// Replays held-out windows through a [`ForecastEngine`] and scores the results.
#[derive(Debug, Clone, Copy)]
pub struct OfflineEvaluator {
    holdout_fraction: f64,
    batch_size: usize,
}

impl Default for OfflineEvaluator {
    fn default() -> Self {
        Self {
            holdout_fraction: DEFAULT_HOLDOUT_FRACTION,
            batch_size: 32,
        }
    }
}

impl OfflineEvaluator {
    /// Creates an evaluator holding out the last 20% of samples.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of trailing samples to evaluate.
    #[must_use]
    pub const fn holdout_fraction(mut self, fraction: f64) -> Self {
        self.holdout_fraction = fraction;
        self
    }

    /// Predictions awaited together; at least one.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Windows `trajectories`, evaluates the trailing share and logs a summary.
    pub async fn run(
        &self,
        engine: &ForecastEngine,
        trajectories: &[Trajectory],
    ) -> Result<EvaluationRun, ForecastError> {
        let samples: Vec<TrainingSample<'_>> = Windower::new(INFERENCE_WINDOW)?
            .windows(trajectories)
            .collect();
        let (train, holdout) = holdout_tail(&samples, self.holdout_fraction)?;

        let mut predictions = Vec::with_capacity(holdout.len());
        let mut provenance = ProvenanceCounts::default();
        for batch in holdout.chunks(self.batch_size) {
            let results = join_all(batch.iter().map(|sample| engine.predict(sample.window))).await;
            for result in results {
                let prediction = result?;
                provenance.record(prediction.provenance);
                predictions.push(prediction.point);
            }
        }
        let targets: Vec<Point> = holdout.iter().map(|sample| sample.target).collect();
        let report = MetricsEvaluator::new().evaluate(&predictions, &targets)?;

        let run = EvaluationRun {
            id: Uuid::new_v4(),
            completed_at: Utc::now(),
            training_samples: train.len(),
            report,
            provenance,
        };
        let logged = engine.telemetry().log(
            LogLevel::Info,
            "forecast.evaluation",
            json!({
                "run": run.id.to_string(),
                "summary": report.summary(),
                "blended": provenance.blended,
                "kinematic": provenance.kinematic,
            }),
        );
        if let Err(err) = logged {
            eprintln!("forecast evaluation log failed: {err:?}");
        }
        Ok(run)
    }
}
