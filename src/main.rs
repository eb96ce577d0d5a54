//! Day-ahead load forecasting CLI.
//!
//! # Usage
//!
//! ```bash
//! # Set API token
//! export ENTSOE_API_KEY=your-token
//!
//! # Pull new feed rows into the bronze layer
//! loadcast fetch
//!
//! # Rebuild the silver/gold layers from bronze
//! loadcast prepare
//!
//! # Walk-forward backtest and accuracy report
//! loadcast backtest
//!
//! # Day-ahead forecast from the latest features
//! loadcast forecast
//!
//! # Re-print the accuracy report from cached predictions
//! loadcast report --windows 24,168
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};

use loadcast::data::{
    EntsoeClient, FetchOutcome, PredictionSeries, RawSeries, SeriesStore, StoreError, Timestamp,
};
use loadcast::metrics::{join_predictions, trailing_mape};
use loadcast::model::{forecast_next_day, RidgeRegressor};
use loadcast::pipeline;
use loadcast::walkforward::WalkForwardEvaluator;

/// Decimation for the week-long backtest window; every step retrains, so
/// the long window is sampled.
const WEEK_WINDOW_DECIMATION: usize = 20;

#[derive(Parser)]
#[command(name = "loadcast")]
#[command(about = "Hourly grid-load forecasting with walk-forward backtesting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull new rows from the ENTSO-E feed into the bronze layer
    Fetch {
        /// Country code to query
        #[arg(long, default_value = "CH")]
        country: String,
    },

    /// Rebuild the aligned series and feature matrix from bronze
    Prepare,

    /// Walk-forward backtest over the trailing day and week
    Backtest {
        /// Ignore cached predictions and retrain every step
        #[arg(long)]
        refresh: bool,
    },

    /// Forecast the next 24 hours from the latest features
    Forecast,

    /// Print trailing MAPE windows from cached predictions
    Report {
        /// Comma-separated window lengths in hours
        #[arg(long, default_value = "24,168")]
        windows: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("loadcast=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let store = SeriesStore::new(&cli.data_dir);

    match cli.command {
        Commands::Fetch { country } => cmd_fetch(&store, &country),
        Commands::Prepare => cmd_prepare(&store),
        Commands::Backtest { refresh } => cmd_backtest(&store, refresh),
        Commands::Forecast => cmd_forecast(&store),
        Commands::Report { windows } => cmd_report(&store, &windows),
    }
}

fn cmd_fetch(store: &SeriesStore, country: &str) -> Result<()> {
    let api_key = std::env::var("ENTSOE_API_KEY")
        .context("ENTSOE_API_KEY environment variable is not set")?;
    let client = EntsoeClient::new(api_key).with_country(country);

    let mut current = read_bronze_or_empty(store)?;
    let before = current.len();

    match client.update(&current).context("feed update failed")? {
        FetchOutcome::Data(new_rows) => {
            current.append(new_rows);
            store.write_raw(&current)?;
            println!(
                "Fetched {} new rows ({} total)",
                current.len() - before,
                current.len()
            );
        }
        FetchOutcome::Empty => {
            println!("Feed returned no new rows ({} on record)", before);
        }
    }
    Ok(())
}

fn cmd_prepare(store: &SeriesStore) -> Result<()> {
    let df = store
        .read_raw_frame()
        .context("no bronze data; run `loadcast fetch` first")?;
    let series = pipeline::enforce_frame(&df).context("bronze data failed validation")?;

    let (aligned, matrix) = pipeline::prepare(series);
    store.write_aligned(&aligned)?;
    store.write_features(&matrix)?;

    println!(
        "Prepared {} aligned hours -> {} feature rows",
        aligned.len(),
        matrix.len()
    );
    Ok(())
}

fn cmd_backtest(store: &SeriesStore, refresh: bool) -> Result<()> {
    let matrix = store
        .read_features()
        .context("no feature matrix; run `loadcast prepare` first")?;
    let anchor =
        latest_labelled_timestamp(&matrix).context("feature matrix has no labelled rows")?;

    let cache = if refresh {
        PredictionSeries::new()
    } else {
        read_cache_or_empty(store)?
    };

    let day_queries = trailing_queries(&matrix, anchor, Duration::hours(24));
    let week_queries = trailing_queries(&matrix, anchor, Duration::hours(168));

    let day_predictions = WalkForwardEvaluator::new().with_progress(true).evaluate(
        &matrix,
        RidgeRegressor::new,
        &day_queries,
        Some(&cache),
    );
    let week_predictions = WalkForwardEvaluator::new()
        .with_decimation(WEEK_WINDOW_DECIMATION)
        .with_progress(true)
        .evaluate(&matrix, RidgeRegressor::new, &week_queries, Some(&cache));

    let mut merged = cache;
    for (ts, value) in day_predictions.iter().chain(week_predictions.iter()) {
        merged.insert(ts, value);
    }
    store.write_backtest_predictions(&merged)?;

    let scored = join_predictions(&matrix, &merged);
    let report = trailing_mape(&scored, &[24, 168]);
    store.write_mape_report(&report)?;

    println!("{}", report.summary());
    Ok(())
}

fn cmd_forecast(store: &SeriesStore) -> Result<()> {
    let matrix = store
        .read_features()
        .context("no feature matrix; run `loadcast prepare` first")?;

    let forecast =
        forecast_next_day(&matrix, RidgeRegressor::new()).context("forecast failed")?;
    store.write_forecast(&forecast)?;

    println!("Day-ahead load forecast:");
    for (ts, value) in forecast.iter() {
        println!("  {}  {:>10.1} MW", ts + Duration::hours(24), value);
    }
    Ok(())
}

fn cmd_report(store: &SeriesStore, windows: &str) -> Result<()> {
    let lookbacks: Vec<i64> = windows
        .split(',')
        .map(|s| s.trim().parse::<i64>())
        .collect::<Result<_, _>>()
        .context("invalid --windows; expected comma-separated hours")?;

    let matrix = store
        .read_features()
        .context("no feature matrix; run `loadcast prepare` first")?;
    let predictions = store
        .read_backtest_predictions()
        .context("no cached predictions; run `loadcast backtest` first")?;

    let scored = join_predictions(&matrix, &predictions);
    let report = trailing_mape(&scored, &lookbacks);
    println!("{}", report.summary());
    Ok(())
}

/// Latest grid hour whose label is already known. The fetch command pulls
/// day-ahead forecast rows through tomorrow, so the trailing stretch of
/// the grid is label-null and the plain last timestamp would anchor the
/// backtest windows on hours that can never be scored.
fn latest_labelled_timestamp(matrix: &loadcast::data::FeatureMatrix) -> Option<Timestamp> {
    matrix
        .rows()
        .iter()
        .rev()
        .find(|r| r.day_later_load.is_some())
        .map(|r| r.timestamp)
}

/// Labelled grid timestamps inside the trailing window `(anchor - span,
/// anchor]`. Label-null rows are skipped: they cannot contribute to the
/// accuracy windows, so retraining on them is wasted work.
fn trailing_queries(
    matrix: &loadcast::data::FeatureMatrix,
    anchor: Timestamp,
    span: Duration,
) -> Vec<Timestamp> {
    let cutoff = anchor - span;
    matrix
        .rows()
        .iter()
        .filter(|r| r.day_later_load.is_some())
        .map(|r| r.timestamp)
        .filter(|ts| *ts > cutoff && *ts <= anchor)
        .collect()
}

fn read_bronze_or_empty(store: &SeriesStore) -> Result<RawSeries> {
    match store.read_raw_frame() {
        Ok(df) => Ok(pipeline::enforce_frame(&df).context("bronze data failed validation")?),
        Err(StoreError::FileNotFound(_)) => Ok(RawSeries::new()),
        Err(e) => Err(e.into()),
    }
}

fn read_cache_or_empty(store: &SeriesStore) -> Result<PredictionSeries> {
    match store.read_backtest_predictions() {
        Ok(cache) => Ok(cache),
        Err(StoreError::FileNotFound(_)) => Ok(PredictionSeries::new()),
        Err(e) => Err(e.into()),
    }
}
