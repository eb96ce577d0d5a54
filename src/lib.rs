pub mod data;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod walkforward;

// Re-export commonly used types
pub use data::{
    AlignedSeries, EntsoeClient, FeatureMatrix, FeedError, FetchOutcome, PredictionSeries,
    RawSeries, SeriesStore, Timestamp,
};
pub use metrics::{MapeReport, MapeWindow, ScoredRow};
pub use model::{Estimator, EstimatorError, MeanEstimator, RidgeRegressor};
pub use pipeline::QualityError;
pub use walkforward::WalkForwardEvaluator;
