//! Parquet persistence for the pipeline layers.
//!
//! Layout under the data directory:
//! - `bronze/load.parquet`: raw feed rows
//! - `silver/load.parquet`: target-aligned hourly series
//! - `gold/features.parquet`: feature matrix
//! - `predictions/backtest.parquet`: walk-forward prediction cache
//! - `predictions/forecast.parquet`: latest day-ahead forecast
//! - `reports/mape.parquet`: trailing accuracy windows
//!
//! Timestamps are stored as RFC 3339 strings, which keeps the files
//! trivially inspectable and sidesteps parquet timezone metadata.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use polars::prelude::*;
use thiserror::Error;

use crate::data::types::{
    AlignedSeries, FeatureMatrix, FeatureRow, PredictionSeries, RawSeries, Timestamp,
};
use crate::metrics::MapeReport;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt store file: {0}")]
    Corrupt(String),
}

/// Parquet-backed store rooted at a data directory.
pub struct SeriesStore {
    data_dir: PathBuf,
}

impl SeriesStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn bronze_path(&self) -> PathBuf {
        self.data_dir.join("bronze").join("load.parquet")
    }

    pub fn silver_path(&self) -> PathBuf {
        self.data_dir.join("silver").join("load.parquet")
    }

    pub fn gold_path(&self) -> PathBuf {
        self.data_dir.join("gold").join("features.parquet")
    }

    pub fn backtest_path(&self) -> PathBuf {
        self.data_dir.join("predictions").join("backtest.parquet")
    }

    pub fn forecast_path(&self) -> PathBuf {
        self.data_dir.join("predictions").join("forecast.parquet")
    }

    pub fn report_path(&self) -> PathBuf {
        self.data_dir.join("reports").join("mape.parquet")
    }

    pub fn write_raw(&self, series: &RawSeries) -> Result<(), StoreError> {
        let rows = series.rows();
        let df = df!(
            "timestamp" => rows.iter().map(|r| r.timestamp.to_rfc3339()).collect::<Vec<_>>(),
            "forecasted_load" => rows.iter().map(|r| r.forecast).collect::<Vec<_>>(),
            "actual_load" => rows.iter().map(|r| r.load).collect::<Vec<_>>(),
        )?;
        self.write_frame(&self.bronze_path(), df)
    }

    /// The bronze frame, unvalidated. The quality enforcer owns schema
    /// checking and conversion to typed rows.
    pub fn read_raw_frame(&self) -> Result<DataFrame, StoreError> {
        self.read_frame(&self.bronze_path())
    }

    pub fn write_aligned(&self, series: &AlignedSeries) -> Result<(), StoreError> {
        let rows = series.rows();
        let df = df!(
            "timestamp" => rows.iter().map(|r| r.timestamp.to_rfc3339()).collect::<Vec<_>>(),
            "day_later_forecast" => rows.iter().map(|r| r.day_later_forecast).collect::<Vec<_>>(),
            "day_later_load" => rows.iter().map(|r| r.day_later_load).collect::<Vec<_>>(),
        )?;
        self.write_frame(&self.silver_path(), df)
    }

    pub fn write_features(&self, matrix: &FeatureMatrix) -> Result<(), StoreError> {
        let rows = matrix.rows();
        let df = df!(
            "timestamp" => rows.iter().map(|r| r.timestamp.to_rfc3339()).collect::<Vec<_>>(),
            "year" => rows.iter().map(|r| r.year).collect::<Vec<_>>(),
            "month" => rows.iter().map(|r| r.month).collect::<Vec<_>>(),
            "day" => rows.iter().map(|r| r.day).collect::<Vec<_>>(),
            "hour" => rows.iter().map(|r| r.hour).collect::<Vec<_>>(),
            "weekday" => rows.iter().map(|r| r.weekday).collect::<Vec<_>>(),
            "load_1h_ago" => rows.iter().map(|r| r.load_1h_ago).collect::<Vec<_>>(),
            "load_2h_ago" => rows.iter().map(|r| r.load_2h_ago).collect::<Vec<_>>(),
            "load_3h_ago" => rows.iter().map(|r| r.load_3h_ago).collect::<Vec<_>>(),
            "load_24h_ago" => rows.iter().map(|r| r.load_24h_ago).collect::<Vec<_>>(),
            "load_7d_ago" => rows.iter().map(|r| r.load_7d_ago).collect::<Vec<_>>(),
            "min_8h" => rows.iter().map(|r| r.min_8h).collect::<Vec<_>>(),
            "max_8h" => rows.iter().map(|r| r.max_8h).collect::<Vec<_>>(),
            "median_8h" => rows.iter().map(|r| r.median_8h).collect::<Vec<_>>(),
            "min_24h" => rows.iter().map(|r| r.min_24h).collect::<Vec<_>>(),
            "max_24h" => rows.iter().map(|r| r.max_24h).collect::<Vec<_>>(),
            "median_24h" => rows.iter().map(|r| r.median_24h).collect::<Vec<_>>(),
            "min_7d" => rows.iter().map(|r| r.min_7d).collect::<Vec<_>>(),
            "max_7d" => rows.iter().map(|r| r.max_7d).collect::<Vec<_>>(),
            "median_7d" => rows.iter().map(|r| r.median_7d).collect::<Vec<_>>(),
            "day_later_load" => rows.iter().map(|r| r.day_later_load).collect::<Vec<_>>(),
        )?;
        self.write_frame(&self.gold_path(), df)
    }

    pub fn read_features(&self) -> Result<FeatureMatrix, StoreError> {
        let df = self.read_frame(&self.gold_path())?;

        let timestamps = df.column("timestamp")?.str()?;
        let years = df.column("year")?.i32()?;
        let months = df.column("month")?.u32()?;
        let days = df.column("day")?.u32()?;
        let hours = df.column("hour")?.u32()?;
        let weekdays = df.column("weekday")?.u32()?;
        let load_1h = df.column("load_1h_ago")?.f64()?;
        let load_2h = df.column("load_2h_ago")?.f64()?;
        let load_3h = df.column("load_3h_ago")?.f64()?;
        let load_24h = df.column("load_24h_ago")?.f64()?;
        let load_7d = df.column("load_7d_ago")?.f64()?;
        let min_8h = df.column("min_8h")?.f64()?;
        let max_8h = df.column("max_8h")?.f64()?;
        let median_8h = df.column("median_8h")?.f64()?;
        let min_24h = df.column("min_24h")?.f64()?;
        let max_24h = df.column("max_24h")?.f64()?;
        let median_24h = df.column("median_24h")?.f64()?;
        let min_7d = df.column("min_7d")?.f64()?;
        let max_7d = df.column("max_7d")?.f64()?;
        let median_7d = df.column("median_7d")?.f64()?;
        let labels = df.column("day_later_load")?.f64()?;

        let mut rows = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            rows.push(FeatureRow {
                timestamp: parse_timestamp(timestamps.get(i), "timestamp")?,
                year: required(years.get(i), "year")?,
                month: required(months.get(i), "month")?,
                day: required(days.get(i), "day")?,
                hour: required(hours.get(i), "hour")?,
                weekday: required(weekdays.get(i), "weekday")?,
                load_1h_ago: load_1h.get(i),
                load_2h_ago: load_2h.get(i),
                load_3h_ago: load_3h.get(i),
                load_24h_ago: load_24h.get(i),
                load_7d_ago: load_7d.get(i),
                min_8h: min_8h.get(i),
                max_8h: max_8h.get(i),
                median_8h: median_8h.get(i),
                min_24h: min_24h.get(i),
                max_24h: max_24h.get(i),
                median_24h: median_24h.get(i),
                min_7d: min_7d.get(i),
                max_7d: max_7d.get(i),
                median_7d: median_7d.get(i),
                day_later_load: labels.get(i),
            });
        }
        Ok(FeatureMatrix::from_rows(rows))
    }

    pub fn write_backtest_predictions(
        &self,
        predictions: &PredictionSeries,
    ) -> Result<(), StoreError> {
        self.write_predictions(&self.backtest_path(), predictions)
    }

    pub fn read_backtest_predictions(&self) -> Result<PredictionSeries, StoreError> {
        self.read_predictions(&self.backtest_path())
    }

    pub fn write_forecast(&self, predictions: &PredictionSeries) -> Result<(), StoreError> {
        self.write_predictions(&self.forecast_path(), predictions)
    }

    pub fn write_mape_report(&self, report: &MapeReport) -> Result<(), StoreError> {
        let df = df!(
            "lookback_hours" => report.windows.iter().map(|w| w.lookback_hours).collect::<Vec<_>>(),
            "window_start" => report.windows.iter().map(|w| w.start.to_rfc3339()).collect::<Vec<_>>(),
            "mape" => report.windows.iter().map(|w| w.mape).collect::<Vec<_>>(),
        )?;
        self.write_frame(&self.report_path(), df)
    }

    fn write_predictions(
        &self,
        path: &Path,
        predictions: &PredictionSeries,
    ) -> Result<(), StoreError> {
        let df = df!(
            "timestamp" => predictions.iter().map(|(ts, _)| ts.to_rfc3339()).collect::<Vec<_>>(),
            "predicted_day_later_load" => predictions.iter().map(|(_, v)| v).collect::<Vec<_>>(),
        )?;
        self.write_frame(path, df)
    }

    fn read_predictions(&self, path: &Path) -> Result<PredictionSeries, StoreError> {
        let df = self.read_frame(path)?;
        let timestamps = df.column("timestamp")?.str()?;
        let values = df.column("predicted_day_later_load")?.f64()?;

        let mut predictions = PredictionSeries::new();
        for i in 0..df.height() {
            let ts = parse_timestamp(timestamps.get(i), "timestamp")?;
            let value = required(values.get(i), "predicted_day_later_load")?;
            predictions.insert(ts, value);
        }
        Ok(predictions)
    }

    fn write_frame(&self, path: &Path, mut df: DataFrame) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        ParquetWriter::new(file).finish(&mut df)?;
        Ok(())
    }

    fn read_frame(&self, path: &Path) -> Result<DataFrame, StoreError> {
        if !path.exists() {
            return Err(StoreError::FileNotFound(path.display().to_string()));
        }
        let df = LazyFrame::scan_parquet(path, ScanArgsParquet::default())?.collect()?;
        Ok(df)
    }
}

fn parse_timestamp(raw: Option<&str>, column: &str) -> Result<Timestamp, StoreError> {
    let raw = raw.ok_or_else(|| StoreError::Corrupt(format!("null {column}")))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad {column} {raw:?}: {e}")))
}

fn required<T>(value: Option<T>, column: &str) -> Result<T, StoreError> {
    value.ok_or_else(|| StoreError::Corrupt(format!("null {column}")))
}
