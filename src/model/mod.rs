//! Regression models and one-shot day-ahead forecasting.

pub mod estimator;
pub mod ridge;

pub use estimator::{Estimator, EstimatorError, MeanEstimator};
pub use ridge::RidgeRegressor;

use tracing::warn;

use crate::data::types::{FeatureMatrix, PredictionSeries};

/// Fit once on every trainable row of the matrix and predict the day-ahead
/// load for the trailing 24 grid hours (the hours whose target is still in
/// the future). Hours whose features cannot be resolved get NaN.
pub fn forecast_next_day<E: Estimator>(
    matrix: &FeatureMatrix,
    mut estimator: E,
) -> Result<PredictionSeries, EstimatorError> {
    let mut train_features = Vec::new();
    let mut train_targets = Vec::new();
    for row in matrix.rows() {
        if let (Some(vector), Some(target)) = (row.feature_vector(), row.day_later_load) {
            train_features.push(vector);
            train_targets.push(target);
        }
    }
    estimator.fit(&train_features, &train_targets)?;

    let horizon: Vec<_> = matrix.rows().iter().rev().take(24).rev().collect();
    let mut predictions = PredictionSeries::new();
    for row in horizon {
        match row.feature_vector() {
            Some(vector) => {
                let predicted = estimator.predict(std::slice::from_ref(&vector))?;
                predictions.insert(row.timestamp, predicted[0]);
            }
            None => {
                warn!(timestamp = %row.timestamp, "features incomplete; forecasting NaN");
                predictions.insert(row.timestamp, f64::NAN);
            }
        }
    }
    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::test_support::{complete_row, ts};
    use approx::assert_relative_eq;
    use chrono::Duration;

    /// 48 hourly complete rows; the trailing 24 have a null label (their
    /// target hour is still open).
    fn horizon_matrix() -> FeatureMatrix {
        let start = ts(2024, 5, 1, 0);
        let rows = (0..48i64)
            .map(|i| {
                let mut row = complete_row(start + Duration::hours(i));
                row.day_later_load = (i < 24).then_some(i as f64);
                row
            })
            .collect();
        FeatureMatrix::from_rows(rows)
    }

    #[test]
    fn forecasts_the_trailing_24_hours() {
        let matrix = horizon_matrix();
        let forecast = forecast_next_day(&matrix, MeanEstimator::new()).unwrap();

        assert_eq!(forecast.len(), 24);
        let first = forecast.timestamps().next().unwrap();
        assert_eq!(first, ts(2024, 5, 2, 0));

        // Mean estimator: every prediction is the mean of labels 0..=23.
        for (_, v) in forecast.iter() {
            assert_relative_eq!(v, 11.5);
        }
    }

    #[test]
    fn unresolvable_horizon_hour_forecasts_nan() {
        let start = ts(2024, 5, 1, 0);
        let rows = (0..48i64)
            .map(|i| {
                let mut row = complete_row(start + Duration::hours(i));
                row.day_later_load = (i < 24).then_some(i as f64);
                if i == 40 {
                    row.load_7d_ago = None;
                }
                row
            })
            .collect();
        let matrix = FeatureMatrix::from_rows(rows);

        let forecast = forecast_next_day(&matrix, MeanEstimator::new()).unwrap();
        assert_eq!(forecast.len(), 24);
        assert!(forecast.get(start + Duration::hours(40)).unwrap().is_nan());
    }

    #[test]
    fn empty_matrix_cannot_be_fitted() {
        let result = forecast_next_day(&FeatureMatrix::default(), MeanEstimator::new());
        assert!(matches!(result, Err(EstimatorError::EmptyTrainingSet)));
    }
}
