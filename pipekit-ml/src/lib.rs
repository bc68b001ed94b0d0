//! # pipekit-ml
//!
//! Numeric datasets, trainable models and the pipeline that drives them.
//!
//! - [`dataset`]: regression and classification datasets with a text file format
//! - [`models`]: [`Regressifier`] / [`Classifier`] capability traits and the
//!   linear, multidimensional and ANBC models
//! - [`metrics`]: RMS error, accuracy, precision/recall and confusion matrices
//! - [`pipeline`]: owns one model and drives train / test / predict / persist
//! - [`persist`]: checksummed JSON envelope for model and pipeline files

pub mod dataset;
pub mod error;
pub mod metrics;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod scaling;

pub use dataset::classification::NULL_CLASS_LABEL;
pub use dataset::{
    ClassificationData, ClassificationSample, ClassificationStats, DatasetRef, RegressionData,
    RegressionSample, RegressionStats,
};
pub use error::{MlError, Result};
pub use metrics::{ClassificationMetrics, RegressionMetrics, TestMetrics};
pub use models::{
    Anbc, AnbcClassModel, ClassificationModel, Classifier, LinearRegression,
    MultidimensionalRegression, RegressionModel, Regressifier,
};
pub use persist::ModelPersistence;
pub use pipeline::{Pipeline, PipelineModel, PipelineState};
pub use scaling::MinMaxRange;
