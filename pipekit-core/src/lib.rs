//! # pipekit-core
//!
//! Shared infrastructure for the pipekit workspace: layered configuration for
//! the example drivers, atomic file persistence with content hashing, and the
//! core error type.

pub mod config;
pub mod error;
pub mod persistence;

pub use config::{
    ClassificationExampleConfig, LoggingConfig, PipekitConfig, RegressionExampleConfig,
    load_config,
};
pub use error::{CoreError, Result};
