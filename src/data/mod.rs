//! Data acquisition, typed series, and parquet persistence.

pub mod entsoe;
pub mod store;
pub mod types;

pub use entsoe::{EntsoeClient, FeedError, FetchOutcome};
pub use store::{SeriesStore, StoreError};
pub use types::{
    AlignedObservation, AlignedSeries, FeatureMatrix, FeatureRow, PredictionSeries,
    RawObservation, RawSeries, Timestamp,
};
