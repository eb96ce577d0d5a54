//! Walk-forward evaluation with strict point-in-time isolation.
//!
//! For every query timestamp a fresh estimator is fitted on the trainable
//! rows strictly before that timestamp and asked for one prediction. Steps
//! are independent, so they run on the rayon pool.

use indicatif::ProgressBar;
use rayon::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::data::types::{FeatureMatrix, PredictionSeries, Timestamp};
use crate::model::{Estimator, EstimatorError};

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("query timestamp {0} is not on the feature grid")]
    MissingTimestamp(Timestamp),

    #[error("features incomplete at {0}")]
    MissingFeatures(Timestamp),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),
}

/// Configurable walk-forward runner. Decimation evaluates every Nth query
/// timestamp, which keeps long-lookback backtests tractable (each step
/// retrains from scratch).
#[derive(Debug, Clone)]
pub struct WalkForwardEvaluator {
    decimation: usize,
    show_progress: bool,
}

impl WalkForwardEvaluator {
    pub fn new() -> Self {
        Self {
            decimation: 1,
            show_progress: false,
        }
    }

    pub fn with_decimation(mut self, every_nth: usize) -> Self {
        self.decimation = every_nth.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Evaluate the (decimated) query timestamps. The result carries one
    /// entry per evaluated timestamp; steps that cannot be resolved record
    /// NaN rather than aborting the batch. Entries found in `cache` are
    /// reused instead of retrained, so a stale cache produces stale values.
    pub fn evaluate<E, F>(
        &self,
        matrix: &FeatureMatrix,
        factory: F,
        query_timestamps: &[Timestamp],
        cache: Option<&PredictionSeries>,
    ) -> PredictionSeries
    where
        E: Estimator,
        F: Fn() -> E + Sync,
    {
        let queries: Vec<Timestamp> = query_timestamps
            .iter()
            .copied()
            .step_by(self.decimation)
            .collect();
        let progress = self
            .show_progress
            .then(|| ProgressBar::new(queries.len() as u64));

        let results: Vec<(Timestamp, f64)> = queries
            .par_iter()
            .map(|&ts| {
                let value = match cache.and_then(|c| c.get(ts)) {
                    Some(cached) => cached,
                    None => match train_predict(matrix, &factory, ts) {
                        Ok(predicted) => predicted,
                        Err(e) => {
                            warn!(timestamp = %ts, error = %e, "walk-forward step failed; recording NaN");
                            f64::NAN
                        }
                    },
                };
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
                (ts, value)
            })
            .collect();

        if let Some(pb) = &progress {
            pb.finish_and_clear();
        }
        results.into_iter().collect()
    }
}

impl Default for WalkForwardEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// One isolated step: fit on rows strictly before `query`, predict `query`.
fn train_predict<E, F>(matrix: &FeatureMatrix, factory: &F, query: Timestamp) -> Result<f64, EvalError>
where
    E: Estimator,
    F: Fn() -> E,
{
    let query_index = matrix
        .index_of(query)
        .ok_or(EvalError::MissingTimestamp(query))?;
    let vector = matrix.rows()[query_index]
        .feature_vector()
        .ok_or(EvalError::MissingFeatures(query))?;

    let mut features = Vec::new();
    let mut targets = Vec::new();
    for row in &matrix.rows()[..query_index] {
        if let (Some(v), Some(y)) = (row.feature_vector(), row.day_later_load) {
            features.push(v);
            targets.push(y);
        }
    }

    let mut model = factory();
    model.fit(&features, &targets)?;
    let predicted = model.predict(std::slice::from_ref(&vector))?;
    Ok(predicted[0])
}
