//! Trailing-window MAPE over joined prediction/actual rows.

use chrono::Duration;

use crate::data::types::{FeatureMatrix, PredictionSeries, Timestamp};

/// One prediction joined against the realized load for its query hour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow {
    pub timestamp: Timestamp,
    pub actual: Option<f64>,
    pub predicted: Option<f64>,
}

/// Join predictions against the matrix labels. NaN predictions (evaluator
/// sentinels) and timestamps off the matrix grid become nulls; the scoring
/// step drops them.
pub fn join_predictions(matrix: &FeatureMatrix, predictions: &PredictionSeries) -> Vec<ScoredRow> {
    predictions
        .iter()
        .map(|(timestamp, predicted)| ScoredRow {
            timestamp,
            actual: matrix.get(timestamp).and_then(|r| r.day_later_load),
            predicted: predicted.is_finite().then_some(predicted),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapeWindow {
    pub lookback_hours: i64,
    /// Inclusive lower bound of the window.
    pub start: Timestamp,
    /// Percent; NaN when no scoreable row falls inside the window.
    pub mape: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MapeReport {
    /// One entry per requested lookback, in request order. Requesting the
    /// same lookback twice yields two entries.
    pub windows: Vec<MapeWindow>,
}

impl MapeReport {
    pub fn window(&self, lookback_hours: i64) -> Option<&MapeWindow> {
        self.windows
            .iter()
            .find(|w| w.lookback_hours == lookback_hours)
    }

    pub fn summary(&self) -> String {
        self.windows
            .iter()
            .map(|w| {
                format!(
                    "MAPE {:>5}h: {:>8.3}%  (since {})",
                    w.lookback_hours, w.mape, w.start
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Score trailing windows anchored at the latest scoreable timestamp.
///
/// Rows missing either side of the join are dropped first, then the anchor
/// is the maximum remaining timestamp; each window covers rows with
/// `timestamp >= anchor - lookback`. With no scoreable rows at all the
/// anchor falls back to the latest input timestamp and every window scores
/// NaN; with no input rows the report is empty.
pub fn trailing_mape(rows: &[ScoredRow], lookbacks_hours: &[i64]) -> MapeReport {
    let mut scored: Vec<(Timestamp, f64, f64)> = rows
        .iter()
        .filter_map(|r| match (r.actual, r.predicted) {
            (Some(a), Some(p)) if a.is_finite() && p.is_finite() => Some((r.timestamp, a, p)),
            _ => None,
        })
        .collect();
    scored.sort_by_key(|&(ts, _, _)| ts);

    let anchor = scored
        .last()
        .map(|&(ts, _, _)| ts)
        .or_else(|| rows.iter().map(|r| r.timestamp).max());
    let Some(anchor) = anchor else {
        return MapeReport::default();
    };

    let windows = lookbacks_hours
        .iter()
        .map(|&lookback_hours| {
            let start = anchor - Duration::hours(lookback_hours);
            let errors: Vec<f64> = scored
                .iter()
                .filter(|&&(ts, _, _)| ts >= start)
                .map(|&(_, actual, predicted)| (actual - predicted).abs() / actual.abs())
                .collect();
            let mape = if errors.is_empty() {
                f64::NAN
            } else {
                100.0 * errors.iter().sum::<f64>() / errors.len() as f64
            };
            MapeWindow {
                lookback_hours,
                start,
                mape,
            }
        })
        .collect();

    MapeReport { windows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::test_support::{complete_row, ts};
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn scored(timestamp: Timestamp, actual: Option<f64>, predicted: Option<f64>) -> ScoredRow {
        ScoredRow {
            timestamp,
            actual,
            predicted,
        }
    }

    #[test]
    fn trailing_windows_anchor_at_the_latest_scoreable_row() {
        let t0 = ts(2024, 4, 1, 12);
        let rows = [
            scored(t0, Some(101.0), Some(101.0)),
            scored(t0 + Duration::hours(24), Some(202.0), Some(101.0)),
            scored(t0 + Duration::hours(48), Some(303.0), Some(303.0)),
        ];

        let report = trailing_mape(&rows, &[1, 24, 48]);
        assert_relative_eq!(report.window(1).unwrap().mape, 0.0);
        assert_relative_eq!(report.window(24).unwrap().mape, 25.0);
        assert_relative_eq!(report.window(48).unwrap().mape, 100.0 / 6.0, epsilon = 1e-9);
        assert_eq!(report.window(24).unwrap().start, t0 + Duration::hours(24));
    }

    #[test]
    fn rows_missing_either_side_are_dropped_before_anchoring() {
        let t0 = ts(2024, 4, 1, 0);
        let rows = [
            scored(t0, Some(100.0), Some(110.0)),
            // Later rows that cannot be scored must not move the anchor.
            scored(t0 + Duration::hours(1), Some(200.0), None),
            scored(t0 + Duration::hours(2), None, Some(150.0)),
        ];

        let report = trailing_mape(&rows, &[1]);
        let window = report.window(1).unwrap();
        assert_eq!(window.start, t0 - Duration::hours(1));
        assert_relative_eq!(window.mape, 10.0);
    }

    #[test]
    fn window_with_no_rows_scores_nan() {
        let t0 = ts(2024, 4, 1, 0);
        let rows = [scored(t0, Some(200.0), None)];

        let report = trailing_mape(&rows, &[24]);
        assert!(report.window(24).unwrap().mape.is_nan());
        assert_eq!(report.window(24).unwrap().start, t0 - Duration::hours(24));
    }

    #[test]
    fn empty_input_yields_an_empty_report() {
        assert!(trailing_mape(&[], &[24, 168]).windows.is_empty());
    }

    #[test]
    fn duplicate_lookbacks_each_get_their_own_window() {
        let t0 = ts(2024, 4, 1, 0);
        let rows = [scored(t0, Some(100.0), Some(90.0))];

        let report = trailing_mape(&rows, &[24, 24]);
        assert_eq!(report.windows.len(), 2);
        assert_eq!(report.windows[0], report.windows[1]);
    }

    #[test]
    fn join_resolves_actuals_and_filters_nan_predictions() {
        let start = ts(2024, 4, 1, 0);
        let matrix_rows = (0..4i64)
            .map(|i| {
                let mut row = complete_row(start + Duration::hours(i));
                row.day_later_load = Some(100.0 + i as f64);
                row
            })
            .collect();
        let matrix = FeatureMatrix::from_rows(matrix_rows);

        let mut predictions = PredictionSeries::new();
        predictions.insert(start, 99.0);
        predictions.insert(start + Duration::hours(1), f64::NAN);
        predictions.insert(ts(2030, 1, 1, 0), 50.0); // off the grid

        let joined = join_predictions(&matrix, &predictions);
        assert_eq!(joined.len(), 3);
        assert_eq!(joined[0].actual, Some(100.0));
        assert_eq!(joined[0].predicted, Some(99.0));
        assert_eq!(joined[1].predicted, None);
        assert_eq!(joined[2].actual, None);
    }
}
