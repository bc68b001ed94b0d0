//! Multidimensional regression driver.
//!
//! Loads a training and a test dataset, fits one linear regressor per target
//! dimension inside a pipeline, round-trips the pipeline through a file,
//! reports the test RMS error and writes predicted vs target values for every
//! test sample to the results file.

use crate::resolve;
use anyhow::{Context, bail};
use pipekit_core::RegressionExampleConfig;
use pipekit_core::persistence::atomic_write;
use pipekit_ml::{LinearRegression, MultidimensionalRegression, Pipeline, RegressionData};
use std::io::Write;
use std::path::Path;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionSummary {
    pub rms_error: f64,
    pub num_test_samples: usize,
}

pub fn run(
    config: &RegressionExampleConfig,
    workspace: &Path,
    out: &mut dyn Write,
) -> anyhow::Result<RegressionSummary> {
    let training_data = RegressionData::load(resolve(workspace, &config.training_data))
        .context("Failed to load training data!")?;
    let test_data = RegressionData::load(resolve(workspace, &config.test_data))
        .context("Failed to load test data!")?;

    if training_data.num_input_dimensions() != test_data.num_input_dimensions() {
        bail!(
            "The number of input dimensions in the training data ({}) does not match the number of input dimensions in the test data ({})",
            training_data.num_input_dimensions(),
            test_data.num_input_dimensions()
        );
    }
    if training_data.num_target_dimensions() != test_data.num_target_dimensions() {
        bail!(
            "The number of target dimensions in the training data ({}) does not match the number of target dimensions in the test data ({})",
            training_data.num_target_dimensions(),
            test_data.num_target_dimensions()
        );
    }

    writeln!(out, "Training and Test datasets loaded")?;
    writeln!(out, "Training data stats:")?;
    write!(out, "{}", training_data.stats())?;
    writeln!(out, "Test data stats:")?;
    write!(out, "{}", test_data.stats())?;

    let linear = LinearRegression::new()
        .with_regularization(config.regularization)
        .context("Invalid regression settings")?;
    let mut pipeline = Pipeline::new();
    pipeline.enable_training_log(config.training_log);
    pipeline.set_regressifier(MultidimensionalRegression::new(linear, config.use_scaling));

    writeln!(out, "Training MultidimensionalRegression model...")?;
    pipeline
        .train(&training_data)
        .context("Failed to train MultidimensionalRegression model!")?;
    writeln!(out, "Model trained.")?;

    let pipeline_file = resolve(workspace, &config.pipeline_file);
    pipeline
        .save_pipeline_to_file(&pipeline_file)
        .context("Failed to save pipeline!")?;
    pipeline
        .load_pipeline_from_file(&pipeline_file)
        .context("Failed to load pipeline!")?;

    writeln!(out, "Testing MultidimensionalRegression model...")?;
    pipeline
        .test(&test_data)
        .context("Failed to test MultidimensionalRegression model!")?;
    let rms_error = pipeline
        .test_rms_error()
        .context("Test finished without an RMS error")?;
    writeln!(out, "Test complete. Test RMS error: {rms_error}")?;
    tracing::debug!(metrics = ?pipeline.test_metrics(), "regression test metrics");

    let mut results = String::new();
    for (i, sample) in test_data.samples().iter().enumerate() {
        pipeline
            .predict(sample.input_vector())
            .with_context(|| format!("Failed to map test sample {i}"))?;
        for value in pipeline.regression_data().iter().chain(sample.target_vector()) {
            results.push_str(&value.to_string());
            results.push('\t');
        }
        results.push('\n');
    }
    let results_file = resolve(workspace, &config.results_file);
    atomic_write(&results_file, results.as_bytes())
        .with_context(|| format!("Failed to write results to {}", results_file.display()))?;
    tracing::info!(path = %results_file.display(), samples = test_data.num_samples(), "results written");

    Ok(RegressionSummary {
        rms_error,
        num_test_samples: test_data.num_samples(),
    })
}
