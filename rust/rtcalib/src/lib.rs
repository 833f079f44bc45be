//! Retention time calibration.
//!
//! Converts peptide retention scores (iRT, hydrophobicity ...) into predicted
//! chromatographic retention times by fitting a line against observed data,
//! choosing the best of several score calculators and trimming outliers until
//! the fit is trustworthy.

pub mod calculators;
pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod plotting;
pub mod regression;
pub mod score_cache;
pub mod standards;
pub mod statistics;
pub mod threshold;

pub use calculators::{
    LibraryCalculator,
    ProjectCalculator,
    RetentionScoreCalculator,
    StandardCountRule,
};
pub use config::RegressionConfig;
pub use engine::{
    RegressionEngine,
    RegressionFit,
};
pub use errors::{
    IncompleteStandardsError,
    InvalidRegressionError,
    RtCalibError,
};
pub use models::{
    MeasuredPoint,
    ReferencePeptide,
};
pub use regression::{
    RegressionModel,
    RetentionTimeRegression,
    RetentionTimeStatistics,
};
pub use score_cache::ScoreCache;
pub use standards::{
    RegressionSource,
    RetentionTimeLookup,
    StandardsFit,
    StandardsRegression,
};
pub use statistics::Statistics;
pub use threshold::{
    ThresholdResult,
    ThresholdSearch,
};
