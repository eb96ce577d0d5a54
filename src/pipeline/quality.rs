//! Data-quality enforcement for the raw load/forecast series.
//!
//! Shape defects (wrong columns, wrong dtypes, unparseable timestamps) are
//! fatal; everything else is repaired in place and logged as a warning:
//! - duplicate timestamps are merged by per-column median
//! - an unsorted index is sorted ascending
//! - actual loads above the 99.9th percentile are dropped (the operator's
//!   feed occasionally logs extreme sensor spikes); null actuals are kept

use polars::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::data::types::{RawObservation, RawSeries, Timestamp};
use crate::pipeline::stats;

/// Column names of the bronze parquet schema.
pub const TIMESTAMP_COLUMN: &str = "timestamp";
pub const FORECAST_COLUMN: &str = "forecasted_load";
pub const ACTUAL_COLUMN: &str = "actual_load";

/// Quantile above which actual-load rows are treated as sensor spikes.
const OUTLIER_QUANTILE: f64 = 0.999;

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("schema violation: {0}")]
    Schema(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Validate the bronze frame shape and convert to typed rows.
///
/// The frame must carry exactly a `timestamp` string column (RFC 3339) and
/// the two Float64 columns `forecasted_load` / `actual_load`; any other
/// shape fails with [`QualityError::Schema`]. Repairs are [`enforce`]'s
/// job.
pub fn enforce_frame(df: &DataFrame) -> Result<RawSeries, QualityError> {
    check_schema(df)?;

    let ts_col = df.column(TIMESTAMP_COLUMN)?.str()?;
    let forecast_col = df.column(FORECAST_COLUMN)?.f64()?;
    let actual_col = df.column(ACTUAL_COLUMN)?.f64()?;

    let mut rows = Vec::with_capacity(df.height());
    for ((ts, forecast), load) in ts_col
        .into_iter()
        .zip(forecast_col.into_iter())
        .zip(actual_col.into_iter())
    {
        let ts = ts.ok_or_else(|| QualityError::Schema("null timestamp".to_string()))?;
        let timestamp = parse_timestamp(ts)?;
        rows.push(RawObservation {
            timestamp,
            forecast,
            load,
        });
    }

    Ok(RawSeries::from_rows(rows))
}

/// Repair a typed raw series: sort, merge duplicates, drop extreme values.
pub fn enforce(series: RawSeries) -> RawSeries {
    let series = sort_if_needed(series);
    let series = merge_duplicates(series);
    filter_extremes(series)
}

fn check_schema(df: &DataFrame) -> Result<(), QualityError> {
    let columns: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|c| c.to_string())
        .collect();
    let expected = [TIMESTAMP_COLUMN, FORECAST_COLUMN, ACTUAL_COLUMN];
    if columns != expected {
        return Err(QualityError::Schema(format!(
            "expected columns {:?}, got {:?}",
            expected, columns
        )));
    }

    if df.column(TIMESTAMP_COLUMN)?.dtype() != &DataType::String {
        return Err(QualityError::Schema(format!(
            "{} must be a string column, got {}",
            TIMESTAMP_COLUMN,
            df.column(TIMESTAMP_COLUMN)?.dtype()
        )));
    }
    for name in [FORECAST_COLUMN, ACTUAL_COLUMN] {
        let dtype = df.column(name)?.dtype();
        if dtype != &DataType::Float64 {
            return Err(QualityError::Schema(format!(
                "{} must be Float64, got {}",
                name, dtype
            )));
        }
    }
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<Timestamp, QualityError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| QualityError::Schema(format!("bad timestamp {raw:?}: {e}")))
}

fn sort_if_needed(series: RawSeries) -> RawSeries {
    if series.is_sorted() {
        return series;
    }
    warn!("raw series index is not monotonic increasing; sorting");
    let mut rows = series.into_rows();
    rows.sort_by_key(|r| r.timestamp);
    RawSeries::from_rows(rows)
}

/// Merge runs of rows sharing a timestamp into one row, taking the
/// per-column median over the non-null values. Load readings are noisy
/// point estimates, so the median is robust to a one-off corrupted
/// duplicate. Assumes the series is already sorted.
fn merge_duplicates(series: RawSeries) -> RawSeries {
    if series.has_unique_timestamps() {
        return series;
    }

    let rows = series.into_rows();
    let mut merged: Vec<RawObservation> = Vec::with_capacity(rows.len());
    let mut duplicate_groups = 0usize;

    let mut i = 0;
    while i < rows.len() {
        let mut j = i + 1;
        while j < rows.len() && rows[j].timestamp == rows[i].timestamp {
            j += 1;
        }
        if j - i == 1 {
            merged.push(rows[i]);
        } else {
            duplicate_groups += 1;
            let group = &rows[i..j];
            merged.push(RawObservation {
                timestamp: rows[i].timestamp,
                forecast: median_of(group.iter().filter_map(|r| r.forecast)),
                load: median_of(group.iter().filter_map(|r| r.load)),
            });
        }
        i = j;
    }

    warn!(
        duplicate_groups,
        "raw series index is not unique; merged duplicates with median"
    );
    RawSeries::from_rows(merged)
}

fn median_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    let collected: Vec<f64> = values.collect();
    stats::median(&collected)
}

/// Drop rows whose actual load exceeds the 99.9th percentile of actual
/// load across the series. Rows with a null actual stay: missing data is
/// not an outlier.
fn filter_extremes(series: RawSeries) -> RawSeries {
    let actuals: Vec<f64> = series.rows().iter().filter_map(|r| r.load).collect();
    let Some(threshold) = stats::percentile_linear(&actuals, OUTLIER_QUANTILE) else {
        return series;
    };

    let before = series.len();
    let rows: Vec<RawObservation> = series
        .into_rows()
        .into_iter()
        .filter(|r| r.load.map_or(true, |v| v <= threshold))
        .collect();

    let dropped = before - rows.len();
    if dropped > 0 {
        warn!(
            dropped,
            total = before,
            threshold,
            "dropped extreme actual-load rows above the 99.9th percentile"
        );
    }
    RawSeries::from_rows(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::test_support::ts;
    use approx::assert_relative_eq;
    use chrono::Duration;

    fn obs(timestamp: Timestamp, forecast: Option<f64>, load: Option<f64>) -> RawObservation {
        RawObservation {
            timestamp,
            forecast,
            load,
        }
    }

    #[test]
    fn duplicate_rows_collapse_to_median() {
        let t = ts(2024, 1, 1, 0);
        let series = RawSeries::from_rows(vec![
            obs(t, Some(100.0), Some(200.0)),
            obs(t, Some(110.0), Some(300.0)),
            obs(t + Duration::hours(1), Some(120.0), Some(250.0)),
        ]);

        let enforced = enforce(series);
        assert_eq!(enforced.len(), 2);
        assert_relative_eq!(enforced.rows()[0].load.unwrap(), 250.0);
        assert_relative_eq!(enforced.rows()[0].forecast.unwrap(), 105.0);
    }

    #[test]
    fn duplicate_merge_ignores_nulls_per_column() {
        let t = ts(2024, 1, 1, 0);
        let series = RawSeries::from_rows(vec![
            obs(t, None, Some(200.0)),
            obs(t, Some(110.0), None),
        ]);

        let enforced = enforce(series);
        assert_eq!(enforced.len(), 1);
        assert_relative_eq!(enforced.rows()[0].load.unwrap(), 200.0);
        assert_relative_eq!(enforced.rows()[0].forecast.unwrap(), 110.0);
    }

    #[test]
    fn unsorted_series_is_sorted() {
        let series = RawSeries::from_rows(vec![
            obs(ts(2024, 1, 1, 2), None, Some(2.0)),
            obs(ts(2024, 1, 1, 0), None, Some(0.0)),
            obs(ts(2024, 1, 1, 1), None, Some(1.0)),
        ]);

        let enforced = enforce(series);
        assert!(enforced.is_sorted());
        assert_eq!(enforced.rows()[0].timestamp, ts(2024, 1, 1, 0));
    }

    /// Plateaued load distribution with one sensor spike: the spike goes,
    /// nothing else moves, and a second pass is a no-op.
    #[test]
    fn extreme_value_filter_is_idempotent_on_plateaued_loads() {
        let start = ts(2023, 1, 1, 0);
        let mut rows = Vec::new();
        for i in 0..2000i64 {
            let load = if i == 1000 {
                50_000.0
            } else if i % 4 == 0 {
                7200.0
            } else {
                7000.0
            };
            rows.push(obs(start + Duration::hours(i), Some(7100.0), Some(load)));
        }
        let series = RawSeries::from_rows(rows);

        let once = enforce(series);
        assert_eq!(once.len(), 1999);
        assert!(once.rows().iter().all(|r| r.load.unwrap() <= 7200.0));

        let twice = enforce(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn null_actuals_survive_the_extreme_filter() {
        let start = ts(2023, 1, 1, 0);
        let mut rows: Vec<_> = (0..2000i64)
            .map(|i| obs(start + Duration::hours(i), None, Some(7000.0)))
            .collect();
        rows[500].load = None;
        rows[1500].load = Some(90_000.0);

        let enforced = enforce(RawSeries::from_rows(rows));
        assert_eq!(enforced.len(), 1999);
        assert!(enforced.rows().iter().any(|r| r.load.is_none()));
    }

    #[test]
    fn clean_series_passes_through_unchanged() {
        let start = ts(2024, 1, 1, 0);
        let rows: Vec<_> = (0..48i64)
            .map(|i| obs(start + Duration::hours(i), Some(7100.0), Some(7000.0)))
            .collect();
        let series = RawSeries::from_rows(rows);

        assert_eq!(enforce(series.clone()), series);
    }

    #[test]
    fn frame_with_wrong_columns_fails_schema_check() {
        let df = df!(
            "timestamp" => &["2024-01-01T00:00:00Z"],
            "forecasted_load" => &[Some(7100.0)],
            "extra" => &[1.0],
        )
        .unwrap();

        assert!(matches!(
            enforce_frame(&df),
            Err(QualityError::Schema(_))
        ));
    }

    #[test]
    fn frame_with_wrong_dtype_fails_schema_check() {
        let df = df!(
            "timestamp" => &["2024-01-01T00:00:00Z"],
            "forecasted_load" => &[1i64],
            "actual_load" => &[Some(7000.0)],
        )
        .unwrap();

        assert!(matches!(
            enforce_frame(&df),
            Err(QualityError::Schema(_))
        ));
    }

    #[test]
    fn frame_roundtrips_into_typed_rows() {
        let df = df!(
            "timestamp" => &["2024-01-01T00:00:00Z", "2024-01-01T01:00:00Z"],
            "forecasted_load" => &[Some(7100.0), None],
            "actual_load" => &[Some(7000.0), Some(6950.0)],
        )
        .unwrap();

        let series = enforce_frame(&df).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.rows()[0].timestamp, ts(2024, 1, 1, 0));
        assert_eq!(series.rows()[1].forecast, None);
    }
}
