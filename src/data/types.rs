//! Core series types for the load-forecasting pipeline.
//!
//! The pipeline moves data through three layers, each with its own type:
//! - bronze: `RawSeries`, straight from the grid operator's feed
//! - silver: `AlignedSeries`, target-aligned and forced to a strict 1h grid
//! - gold: `FeatureMatrix`, calendar/lag/rolling features plus the label
//!
//! Predictions produced by the walk-forward evaluator live in a
//! `PredictionSeries` keyed by query timestamp.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// All pipeline timestamps are UTC; the ingestion boundary normalizes the
/// operator's local zone before anything reaches the core.
pub type Timestamp = DateTime<Utc>;

/// Truncate a timestamp to the start of its hour.
pub fn floor_to_hour(ts: Timestamp) -> Timestamp {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// A single row of the operator's feed: the load forecast and the actual
/// load for the hour starting at `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub timestamp: Timestamp,
    pub forecast: Option<f64>,
    pub load: Option<f64>,
}

/// Bronze-layer series. Not guaranteed sorted or unique; the quality
/// enforcer repairs both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    rows: Vec<RawObservation>,
}

impl RawSeries {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn from_rows(rows: Vec<RawObservation>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[RawObservation] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<RawObservation> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append another series, keeping insertion order. The result may need
    /// re-sorting; that is the quality enforcer's job.
    pub fn append(&mut self, other: RawSeries) {
        self.rows.extend(other.rows);
    }

    pub fn is_sorted(&self) -> bool {
        self.rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
    }

    /// Whether every timestamp occurs exactly once. Only meaningful on a
    /// sorted series.
    pub fn has_unique_timestamps(&self) -> bool {
        self.rows.windows(2).all(|w| w[0].timestamp != w[1].timestamp)
    }

    /// Timestamp of the latest row carrying a non-null actual load, if any.
    /// Used to anchor incremental feed updates.
    pub fn latest_actual_timestamp(&self) -> Option<Timestamp> {
        self.rows
            .iter()
            .filter(|r| r.load.is_some())
            .map(|r| r.timestamp)
            .max()
    }
}

/// A target-aligned row: at `timestamp` we know (or will later know) the
/// forecast/load for `timestamp + 24h`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedObservation {
    pub timestamp: Timestamp,
    pub day_later_forecast: Option<f64>,
    pub day_later_load: Option<f64>,
}

/// Silver-layer series. Invariant: timestamps are unique, strictly
/// increasing, and exactly one hour apart; gaps are materialized as
/// all-null rows. Downstream lag/rolling arithmetic relies on this to use
/// fixed integer offsets instead of timestamp search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedSeries {
    rows: Vec<AlignedObservation>,
}

impl AlignedSeries {
    /// Build from rows that already satisfy the 1h-grid invariant.
    /// Violating it is a programming error in the caller.
    pub fn from_rows(rows: Vec<AlignedObservation>) -> Self {
        debug_assert!(
            rows.windows(2)
                .all(|w| w[1].timestamp - w[0].timestamp == Duration::hours(1)),
            "aligned series must have exact 1h spacing"
        );
        Self { rows }
    }

    pub fn rows(&self) -> &[AlignedObservation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.rows.first().map(|r| r.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.rows.last().map(|r| r.timestamp)
    }

    /// Position of `ts` on the hourly grid, if it falls inside the series.
    pub fn index_of(&self, ts: Timestamp) -> Option<usize> {
        let start = self.first_timestamp()?;
        let delta = ts - start;
        if delta.num_seconds() < 0 || delta.num_seconds() % 3600 != 0 {
            return None;
        }
        let idx = delta.num_hours() as usize;
        (idx < self.rows.len()).then_some(idx)
    }

    pub fn get(&self, ts: Timestamp) -> Option<&AlignedObservation> {
        self.index_of(ts).map(|i| &self.rows[i])
    }
}

/// Hour offsets of the lagged-load features.
pub const LAG_HOURS: [i64; 5] = [1, 2, 3, 24, 168];

/// Window widths (hours) of the rolling statistics.
pub const WINDOW_HOURS: [i64; 3] = [8, 24, 168];

/// Names of the serving features, in the order produced by
/// [`FeatureRow::feature_vector`].
pub const FEATURE_NAMES: [&str; 19] = [
    "year",
    "month",
    "day",
    "hour",
    "weekday",
    "load_1h_ago",
    "load_2h_ago",
    "load_3h_ago",
    "load_24h_ago",
    "load_7d_ago",
    "min_8h",
    "max_8h",
    "median_8h",
    "min_24h",
    "max_24h",
    "median_24h",
    "min_7d",
    "max_7d",
    "median_7d",
];

/// Gold-layer row: calendar fields, lagged loads, rolling statistics, and
/// the label. Calendar fields are always defined; everything else is null
/// where the underlying positions fall outside the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp: Timestamp,

    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    /// ISO weekday, Monday = 1 through Sunday = 7.
    pub weekday: u32,

    pub load_1h_ago: Option<f64>,
    pub load_2h_ago: Option<f64>,
    pub load_3h_ago: Option<f64>,
    pub load_24h_ago: Option<f64>,
    pub load_7d_ago: Option<f64>,

    pub min_8h: Option<f64>,
    pub max_8h: Option<f64>,
    pub median_8h: Option<f64>,
    pub min_24h: Option<f64>,
    pub max_24h: Option<f64>,
    pub median_24h: Option<f64>,
    pub min_7d: Option<f64>,
    pub max_7d: Option<f64>,
    pub median_7d: Option<f64>,

    /// Label: the actual load 24h after `timestamp`. Null while the hour is
    /// still in the future (such rows are query targets, never training
    /// rows).
    pub day_later_load: Option<f64>,
}

impl FeatureRow {
    /// The serving vector, ordered as [`FEATURE_NAMES`]. None if any lag or
    /// rolling statistic is missing.
    pub fn feature_vector(&self) -> Option<Vec<f64>> {
        let optional = [
            self.load_1h_ago,
            self.load_2h_ago,
            self.load_3h_ago,
            self.load_24h_ago,
            self.load_7d_ago,
            self.min_8h,
            self.max_8h,
            self.median_8h,
            self.min_24h,
            self.max_24h,
            self.median_24h,
            self.min_7d,
            self.max_7d,
            self.median_7d,
        ];
        let mut features = Vec::with_capacity(FEATURE_NAMES.len());
        features.push(self.year as f64);
        features.push(self.month as f64);
        features.push(self.day as f64);
        features.push(self.hour as f64);
        features.push(self.weekday as f64);
        for value in optional {
            features.push(value?);
        }
        Some(features)
    }

    /// A row may be used for fitting only when every feature and the label
    /// are present.
    pub fn is_trainable(&self) -> bool {
        self.day_later_load.is_some() && self.feature_vector().is_some()
    }
}

/// Gold-layer matrix. Same timestamp invariants as [`AlignedSeries`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    pub fn from_rows(rows: Vec<FeatureRow>) -> Self {
        debug_assert!(
            rows.windows(2)
                .all(|w| w[1].timestamp - w[0].timestamp == Duration::hours(1)),
            "feature matrix must have exact 1h spacing"
        );
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.rows.first().map(|r| r.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.rows.last().map(|r| r.timestamp)
    }

    pub fn index_of(&self, ts: Timestamp) -> Option<usize> {
        let start = self.first_timestamp()?;
        let delta = ts - start;
        if delta.num_seconds() < 0 || delta.num_seconds() % 3600 != 0 {
            return None;
        }
        let idx = delta.num_hours() as usize;
        (idx < self.rows.len()).then_some(idx)
    }

    pub fn get(&self, ts: Timestamp) -> Option<&FeatureRow> {
        self.index_of(ts).map(|i| &self.rows[i])
    }
}

/// Predicted day-later loads keyed by query timestamp. NaN marks a
/// timestamp the evaluator could not resolve (missing features); keys are
/// never omitted for requested timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionSeries {
    values: BTreeMap<Timestamp, f64>,
}

impl PredictionSeries {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, ts: Timestamp, predicted: f64) {
        self.values.insert(ts, predicted);
    }

    pub fn get(&self, ts: Timestamp) -> Option<f64> {
        self.values.get(&ts).copied()
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.values.contains_key(&ts)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Timestamp, f64)> + '_ {
        self.values.iter().map(|(ts, v)| (*ts, *v))
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.values.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(Timestamp, f64)> for PredictionSeries {
    fn from_iter<I: IntoIterator<Item = (Timestamp, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{Datelike, TimeZone};

    pub fn ts(y: i32, mo: u32, d: u32, h: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    /// A feature row with every field populated, for evaluator/metrics
    /// tests that need trainable rows without running the full builder.
    pub fn complete_row(timestamp: Timestamp) -> FeatureRow {
        FeatureRow {
            timestamp,
            year: timestamp.year(),
            month: timestamp.month(),
            day: timestamp.day(),
            hour: timestamp.hour(),
            weekday: timestamp.weekday().number_from_monday(),
            load_1h_ago: Some(1.0),
            load_2h_ago: Some(2.0),
            load_3h_ago: Some(3.0),
            load_24h_ago: Some(24.0),
            load_7d_ago: Some(168.0),
            min_8h: Some(1.0),
            max_8h: Some(8.0),
            median_8h: Some(4.0),
            min_24h: Some(1.0),
            max_24h: Some(24.0),
            median_24h: Some(12.0),
            min_7d: Some(1.0),
            max_7d: Some(168.0),
            median_7d: Some(84.0),
            day_later_load: Some(7000.0),
        }
    }
}
