//! The estimator seam between the walk-forward evaluator and concrete
//! regression models. Anything that can fit on feature/target slices and
//! predict on feature slices plugs into the evaluator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("feature dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("predict called before fit")]
    NotFitted,

    #[error("normal equations are numerically singular")]
    Singular,
}

/// A point-forecast regressor. Implementations must be fully retrainable:
/// the evaluator constructs a fresh instance per query timestamp, so `fit`
/// must not assume any prior state.
pub trait Estimator {
    /// Fit on training rows. `features[i]` is the serving vector for
    /// `targets[i]`; all rows must share one dimension.
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), EstimatorError>;

    /// Predict one value per feature row. Fails if `fit` has not run or
    /// dimensions disagree with the fitted model.
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError>;
}

/// Predicts the mean of the training targets regardless of features.
/// Baseline for sanity checks and deterministic tests.
#[derive(Debug, Default, Clone)]
pub struct MeanEstimator {
    mean: Option<f64>,
}

impl MeanEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Estimator for MeanEstimator {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<(), EstimatorError> {
        if targets.is_empty() || features.len() != targets.len() {
            return Err(EstimatorError::EmptyTrainingSet);
        }
        self.mean = Some(targets.iter().sum::<f64>() / targets.len() as f64);
        Ok(())
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, EstimatorError> {
        let mean = self.mean.ok_or(EstimatorError::NotFitted)?;
        Ok(vec![mean; features.len()])
    }
}
