//! Adaptive naive Bayes classification driver.
//!
//! Configures an ANBC model with scaling and null rejection, splits the
//! labelled data into training and test sets, trains, round-trips the model
//! through a file and prints the predicted label of every test sample before
//! reporting the test accuracy.

use crate::resolve;
use anyhow::Context;
use pipekit_core::ClassificationExampleConfig;
use pipekit_ml::metrics::ClassificationAccumulator;
use pipekit_ml::{Anbc, ClassificationData, ClassificationMetrics, Classifier, ModelPersistence};
use std::io::Write;
use std::path::Path;

pub fn run(
    config: &ClassificationExampleConfig,
    workspace: &Path,
    out: &mut dyn Write,
) -> anyhow::Result<ClassificationMetrics> {
    let mut anbc = Anbc::new()
        .with_null_rejection_coeff(config.null_rejection_coeff)
        .context("Invalid classifier settings")?
        .with_scaling(config.use_scaling)
        .with_null_rejection(config.use_null_rejection);

    let mut training_data = ClassificationData::load(resolve(workspace, &config.training_data))
        .context("Failed to load training data!")?;

    let test_data = if config.stratified {
        training_data.partition_stratified(config.training_split_percent, config.seed)
    } else {
        training_data.partition(config.training_split_percent, config.seed)
    }
    .context("Failed to partition training data!")?;
    tracing::info!(
        training = training_data.num_samples(),
        test = test_data.num_samples(),
        "data partitioned"
    );

    anbc.train(&training_data)
        .context("Failed to train classifier!")?;

    let model_file = resolve(workspace, &config.model_file);
    anbc.save_model_to_file(&model_file)
        .context("Failed to save the classifier model!")?;
    anbc.load_model_from_file(&model_file)
        .context("Failed to load the classifier model!")?;

    let mut accumulator = ClassificationAccumulator::new(anbc.class_labels());
    for (i, sample) in test_data.samples().iter().enumerate() {
        anbc.predict(sample.sample())
            .with_context(|| format!("Failed to perform prediction for test sample: {i}"))?;
        let predicted = anbc
            .predicted_class_label()
            .with_context(|| format!("No class label predicted for test sample: {i}"))?;
        tracing::debug!(
            sample = i,
            likelihoods = ?anbc.class_likelihoods(),
            distances = ?anbc.class_distances(),
            "prediction"
        );
        accumulator.add(sample.class_label(), predicted);
        writeln!(
            out,
            "TestSample: {i} ClassLabel: {} PredictedClassLabel: {predicted}",
            sample.class_label()
        )?;
    }

    let metrics = accumulator
        .finish()
        .context("No test samples left after partitioning!")?;
    writeln!(out, "Test Accuracy: {}%", metrics.accuracy_percent())?;
    tracing::debug!("classification test metrics\n{metrics}");
    Ok(metrics)
}
