//! Configuration for the pipekit example drivers.
//!
//! Uses `figment` for layered configuration: defaults -> user config ->
//! workspace `pipekit.toml` -> `PIPEKIT_` environment variables. The drivers
//! take no command-line arguments; every file name they touch has a fixed
//! default here and can only be changed through these layers.

use crate::error::{CoreError, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the workspace-level configuration file.
pub const WORKSPACE_CONFIG_FILE: &str = "pipekit.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipekitConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub regression: RegressionExampleConfig,
    #[serde(default)]
    pub classification: ClassificationExampleConfig,
}

/// Logging configuration shared by both drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive for the stderr layer (e.g. `info`, `pipekit_ml=debug`).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the structured JSON log file. Disabled when unset.
    #[serde(default)]
    pub json_log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_log_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Settings for the multidimensional regression driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionExampleConfig {
    #[serde(default = "default_regression_training_data")]
    pub training_data: PathBuf,
    #[serde(default = "default_regression_test_data")]
    pub test_data: PathBuf,
    #[serde(default = "default_pipeline_file")]
    pub pipeline_file: PathBuf,
    #[serde(default = "default_results_file")]
    pub results_file: PathBuf,
    /// Scale inputs and targets to `[0, 1]` inside the composite regressor.
    #[serde(default = "default_true")]
    pub use_scaling: bool,
    /// Ridge penalty for each linear sub-model.
    #[serde(default)]
    pub regularization: f64,
    /// Report per-dimension training progress at `info` level.
    #[serde(default = "default_true")]
    pub training_log: bool,
}

impl Default for RegressionExampleConfig {
    fn default() -> Self {
        Self {
            training_data: default_regression_training_data(),
            test_data: default_regression_test_data(),
            pipeline_file: default_pipeline_file(),
            results_file: default_results_file(),
            use_scaling: true,
            regularization: 0.0,
            training_log: true,
        }
    }
}

fn default_regression_training_data() -> PathBuf {
    PathBuf::from("data/MultidimensionalRegressionTrainingData.txt")
}

fn default_regression_test_data() -> PathBuf {
    PathBuf::from("data/MultidimensionalRegressionTestData.txt")
}

fn default_pipeline_file() -> PathBuf {
    PathBuf::from("Pipeline")
}

fn default_results_file() -> PathBuf {
    PathBuf::from("MultidimensionalRegressionResultsData.txt")
}

/// Settings for the naive Bayes classification driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationExampleConfig {
    #[serde(default = "default_classification_training_data")]
    pub training_data: PathBuf,
    #[serde(default = "default_model_file")]
    pub model_file: PathBuf,
    /// Percentage of the loaded data kept for training; the rest is the test set.
    #[serde(default = "default_split_percent")]
    pub training_split_percent: f64,
    /// Seed for the partition shuffle.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Partition each class separately.
    #[serde(default)]
    pub stratified: bool,
    #[serde(default = "default_true")]
    pub use_null_rejection: bool,
    #[serde(default = "default_null_rejection_coeff")]
    pub null_rejection_coeff: f64,
    #[serde(default = "default_true")]
    pub use_scaling: bool,
}

impl Default for ClassificationExampleConfig {
    fn default() -> Self {
        Self {
            training_data: default_classification_training_data(),
            model_file: default_model_file(),
            training_split_percent: default_split_percent(),
            seed: default_seed(),
            stratified: false,
            use_null_rejection: true,
            null_rejection_coeff: default_null_rejection_coeff(),
            use_scaling: true,
        }
    }
}

fn default_classification_training_data() -> PathBuf {
    PathBuf::from("data/ANBCTrainingData.txt")
}

fn default_model_file() -> PathBuf {
    PathBuf::from("ANBCModel.txt")
}

fn default_split_percent() -> f64 {
    80.0
}

fn default_seed() -> u64 {
    42
}

fn default_null_rejection_coeff() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

impl PipekitConfig {
    /// Reject values no driver could use.
    pub fn validate(&self) -> Result<()> {
        let split = self.classification.training_split_percent;
        if !(0.0..=100.0).contains(&split) {
            return Err(CoreError::invalid_config(format!(
                "classification.training_split_percent must be within [0, 100], got {split}"
            )));
        }
        let coeff = self.classification.null_rejection_coeff;
        if !coeff.is_finite() || coeff < 0.0 {
            return Err(CoreError::invalid_config(format!(
                "classification.null_rejection_coeff must be a non-negative number, got {coeff}"
            )));
        }
        let ridge = self.regression.regularization;
        if !ridge.is_finite() || ridge < 0.0 {
            return Err(CoreError::invalid_config(format!(
                "regression.regularization must be a non-negative number, got {ridge}"
            )));
        }
        Ok(())
    }
}

/// Path of the user-level config file (`~/.config/pipekit/config.toml` on Linux).
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "pipekit", "pipekit")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Environment variables (`PIPEKIT_CLASSIFICATION__SEED=7`, ...)
/// 2. Workspace config (`<workspace>/pipekit.toml`)
/// 3. User config (see [`user_config_path`])
/// 4. Built-in defaults
pub fn load_config(workspace: Option<&Path>) -> Result<PipekitConfig> {
    let config: PipekitConfig = layered_figment(user_config_path().as_deref(), workspace)
        .extract()
        .map_err(Box::new)?;
    config.validate()?;
    Ok(config)
}

fn layered_figment(user_config: Option<&Path>, workspace: Option<&Path>) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(PipekitConfig::default()));

    if let Some(user_config) = user_config.filter(|p| p.exists()) {
        figment = figment.merge(Toml::file(user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(WORKSPACE_CONFIG_FILE);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(ws_config));
        }
    }

    figment.merge(Env::prefixed("PIPEKIT_").split("__"))
}
