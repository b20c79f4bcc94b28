//! Cross-validated Mahalanobis distance decoding.
//!
//! Decodes circular (angle) or nominal (class) variables from
//! trials × channels × time observations. Each held-out trial is compared
//! with class templates averaged from training trials, using a
//! Mahalanobis distance under a Ledoit-Wolf-style diagonal-target
//! shrinkage covariance estimated on the training data of every time
//! point.
//!
//! ## Modules
//!
//! - [`circular`]: circular distance and angular binning
//! - [`covariance`]: shrinkage covariance estimation
//! - [`basis`]: raised-cosine smoothing of angular bin templates
//! - [`folds`]: repeated stratified k-fold partitioning
//! - [`training`]: balanced class templates per fold
//! - [`metric`]: Euclidean and Mahalanobis template distances
//! - [`decode`]: the four decoding pipelines
//! - [`simulation`]: synthetic datasets
//!
//! All tensors are stored column-major; the first index varies fastest.
//!
//! ## Features
//!
//! - `parallel` (default): distances of the time points of a fold are
//!   computed with rayon
//! - `serde`: serialization of configuration types

pub mod basis;
pub mod circular;
pub mod config;
pub mod covariance;
pub mod decode;
pub mod error;
pub mod folds;
pub mod matrix;
pub mod metric;
pub mod progress;
pub mod simulation;
pub mod training;

/// Iterate a range or collection in parallel when the `parallel` feature
/// is enabled, sequentially otherwise.
macro_rules! iter_maybe_parallel {
    ($expr:expr) => {{
        #[cfg(feature = "parallel")]
        let iter = rayon::iter::IntoParallelIterator::into_par_iter($expr);
        #[cfg(not(feature = "parallel"))]
        let iter = ::std::iter::IntoIterator::into_iter($expr);
        iter
    }};
}
pub(crate) use iter_maybe_parallel;

pub use config::{AngularSpace, CircularConfig, DecodeConfig, NominalConfig};
pub use decode::{
    decode_circular, decode_circular_cross_temporal, decode_nominal,
    decode_nominal_cross_temporal, CircularCrossTemporalDecoding, CircularDecoding, DecodeInput,
    NominalCrossTemporalDecoding, NominalDecoding,
};
pub use error::{DecodingError, DecodingResult, FoldLocation};
pub use matrix::{FdMatrix, Tensor3, Tensor4};
pub use metric::{DistanceMetric, MahalanobisPath};
pub use progress::{Monitor, Progress};
