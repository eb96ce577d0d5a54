//! Feature extraction over the aligned (silver) series.
//!
//! All temporal features are fixed integer offsets into the hourly grid.
//! A row's own hour is its target hour minus 24, so "the load N hours
//! before the target's original hour" lives `24 + N` positions back in the
//! `day_later_load` column. Rolling statistics are windows over the
//! 1h-ago-load series: a width-W window at row `i` covers positions
//! `i-24-W .. i-24-1`.

use chrono::{Datelike, Timelike};

use crate::data::types::{AlignedSeries, FeatureMatrix, FeatureRow};
use crate::pipeline::stats;

/// Derive calendar, lagged-load, and rolling-statistic features for every
/// row of the aligned series. Rows with incomplete features are kept (they
/// may still be query targets); excluding them from training is the
/// evaluator's job.
pub fn build(aligned: &AlignedSeries) -> FeatureMatrix {
    let loads: Vec<Option<f64>> = aligned.rows().iter().map(|r| r.day_later_load).collect();

    let rows = aligned
        .rows()
        .iter()
        .enumerate()
        .map(|(i, obs)| {
            let ts = obs.timestamp;
            let (min_8h, max_8h, median_8h) = rolling_stats(&loads, i, 8);
            let (min_24h, max_24h, median_24h) = rolling_stats(&loads, i, 24);
            let (min_7d, max_7d, median_7d) = rolling_stats(&loads, i, 168);
            FeatureRow {
                timestamp: ts,
                year: ts.year(),
                month: ts.month(),
                day: ts.day(),
                hour: ts.hour(),
                weekday: ts.weekday().number_from_monday(),
                load_1h_ago: lagged_load(&loads, i, 1),
                load_2h_ago: lagged_load(&loads, i, 2),
                load_3h_ago: lagged_load(&loads, i, 3),
                load_24h_ago: lagged_load(&loads, i, 24),
                load_7d_ago: lagged_load(&loads, i, 168),
                min_8h,
                max_8h,
                median_8h,
                min_24h,
                max_24h,
                median_24h,
                min_7d,
                max_7d,
                median_7d,
                day_later_load: obs.day_later_load,
            }
        })
        .collect();

    FeatureMatrix::from_rows(rows)
}

/// The actual load `n_hours` before row `i`'s own (pre-shift) hour: the
/// `day_later_load` value `24 + n_hours` positions back. None before the
/// start of the series.
fn lagged_load(loads: &[Option<f64>], i: usize, n_hours: i64) -> Option<f64> {
    let idx = i as i64 - (24 + n_hours);
    if idx < 0 {
        None
    } else {
        loads[idx as usize]
    }
}

/// NaN-aware (min, max, median) over the `window` most recent hourly loads
/// as of row `i`, i.e. positions `i-24-window ..= i-25`. Positions before
/// the series start are skipped; a window with no non-null values yields
/// all-None.
fn rolling_stats(
    loads: &[Option<f64>],
    i: usize,
    window: i64,
) -> (Option<f64>, Option<f64>, Option<f64>) {
    let end = i as i64 - 25; // inclusive, the 1h-ago position
    let start = (i as i64 - 24 - window).max(0);
    if end < 0 {
        return (None, None, None);
    }

    let values: Vec<f64> = (start..=end)
        .filter_map(|idx| loads[idx as usize])
        .collect();

    (
        stats::min(&values),
        stats::max(&values),
        stats::median(&values),
    )
}
