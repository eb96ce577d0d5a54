//! Bronze -> silver -> gold transformation pipeline.
//!
//! - [`quality`]: validate and repair the raw operator feed
//! - [`align`]: shift to target alignment and force the 1h grid
//! - [`features`]: derive calendar, lag, and rolling features

pub mod align;
pub mod features;
pub mod quality;
mod stats;

pub use align::align;
pub use features::build;
pub use quality::{enforce, enforce_frame, QualityError};

use crate::data::types::{AlignedSeries, FeatureMatrix, RawSeries};

/// Run the full transformation on an in-memory raw series, returning both
/// the aligned (silver) series and the feature (gold) matrix.
pub fn prepare(raw: RawSeries) -> (AlignedSeries, FeatureMatrix) {
    let cleaned = quality::enforce(raw);
    let aligned = align::align(&cleaned);
    let matrix = features::build(&aligned);
    (aligned, matrix)
}
