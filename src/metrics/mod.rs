//! Forecast accuracy metrics.

pub mod mape;

pub use mape::{join_predictions, trailing_mape, MapeReport, MapeWindow, ScoredRow};
