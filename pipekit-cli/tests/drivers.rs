//! Run both drivers end to end inside scratch directories.

use pipekit_cli::{classification_example, regression_example};
use pipekit_core::{ClassificationExampleConfig, RegressionExampleConfig};
use pipekit_ml::{ClassificationData, Pipeline, PipelineState, RegressionData};
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

fn write_regression_data(path: &Path, inputs: usize, offset: f64) {
    let mut data = RegressionData::new(inputs, 3);
    for i in 0..40 {
        let t = f64::from(i) / 10.0 + offset;
        let input: Vec<f64> = (0..inputs).map(|d| (t * (d as f64 + 1.0)).sin()).collect();
        let target = vec![
            input[0] + 0.5,
            2.0 * input[0] - input[inputs - 1],
            -input[inputs - 1],
        ];
        data.add_sample(input, target).unwrap();
    }
    data.save(path).unwrap();
}

fn write_classification_data(path: &Path) {
    let mut data = ClassificationData::new(2);
    for (label, (cx, cy)) in [(1, (0.0, 0.0)), (2, (4.0, 4.0)), (3, (-4.0, 4.0))] {
        for i in 0..25 {
            let t = f64::from(i);
            data.add_sample(label, vec![cx + (t * 0.9).sin() * 0.5, cy + (t * 1.3).cos() * 0.5])
                .unwrap();
        }
    }
    data.save(path).unwrap();
}

fn regression_config() -> RegressionExampleConfig {
    RegressionExampleConfig {
        training_data: "train.txt".into(),
        test_data: "test.txt".into(),
        ..RegressionExampleConfig::default()
    }
}

#[test]
fn regression_driver_writes_results() {
    let dir = TempDir::new().unwrap();
    write_regression_data(&dir.path().join("train.txt"), 2, 0.0);
    write_regression_data(&dir.path().join("test.txt"), 2, 0.05);

    let mut out = Vec::new();
    let summary = regression_example::run(&regression_config(), dir.path(), &mut out).unwrap();
    assert_eq!(summary.num_test_samples, 40);
    assert!(summary.rms_error < 1e-6, "rms {}", summary.rms_error);

    let stdout = String::from_utf8(out).unwrap();
    assert!(stdout.contains("Training and Test datasets loaded"));
    assert!(stdout.contains("Model trained."));
    assert!(stdout.contains("Test complete. Test RMS error: "));

    let results =
        std::fs::read_to_string(dir.path().join("MultidimensionalRegressionResultsData.txt"))
            .unwrap();
    let lines: Vec<&str> = results.lines().collect();
    assert_eq!(lines.len(), 40);
    for line in lines {
        assert!(line.ends_with('\t'));
        assert_eq!(line.split_whitespace().count(), 6);
    }

    let mut pipeline = Pipeline::new();
    pipeline.load_pipeline_from_file(dir.path().join("Pipeline")).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Trained);
}

#[test]
fn regression_driver_rejects_mismatched_inputs() {
    let dir = TempDir::new().unwrap();
    write_regression_data(&dir.path().join("train.txt"), 2, 0.0);
    write_regression_data(&dir.path().join("test.txt"), 3, 0.0);

    let err = regression_example::run(&regression_config(), dir.path(), &mut Vec::new())
        .unwrap_err();
    assert!(format!("{err:#}").contains("input dimensions"), "{err:#}");
    assert!(!dir.path().join("Pipeline").exists());
}

#[test]
fn regression_driver_reports_missing_training_data() {
    let dir = TempDir::new().unwrap();
    let err = regression_example::run(&regression_config(), dir.path(), &mut Vec::new())
        .unwrap_err();
    assert!(format!("{err:#}").starts_with("Failed to load training data!"));
}

#[test]
fn classification_driver_reports_accuracy() {
    let dir = TempDir::new().unwrap();
    write_classification_data(&dir.path().join("anbc.txt"));
    let config = ClassificationExampleConfig {
        training_data: "anbc.txt".into(),
        ..ClassificationExampleConfig::default()
    };

    let mut out = Vec::new();
    let metrics = classification_example::run(&config, dir.path(), &mut out).unwrap();
    assert_eq!(metrics.num_samples, 15);
    assert_eq!(metrics.accuracy_percent(), 100.0);

    let stdout = String::from_utf8(out).unwrap();
    assert_eq!(stdout.lines().filter(|l| l.starts_with("TestSample: ")).count(), 15);
    assert!(stdout.ends_with("Test Accuracy: 100%\n"), "{stdout}");
    assert!(dir.path().join("ANBCModel.txt").exists());
}

#[test]
fn classification_driver_stratified_split() {
    let dir = TempDir::new().unwrap();
    write_classification_data(&dir.path().join("anbc.txt"));
    let config = ClassificationExampleConfig {
        training_data: "anbc.txt".into(),
        stratified: true,
        ..ClassificationExampleConfig::default()
    };

    let metrics = classification_example::run(&config, dir.path(), &mut Vec::new()).unwrap();
    assert_eq!(metrics.num_samples, 15);
    for row in &metrics.confusion_matrix {
        assert_eq!(row.iter().sum::<usize>(), 5);
    }
}

#[test]
fn classification_driver_needs_test_samples() {
    let dir = TempDir::new().unwrap();
    write_classification_data(&dir.path().join("anbc.txt"));
    let config = ClassificationExampleConfig {
        training_data: "anbc.txt".into(),
        training_split_percent: 100.0,
        ..ClassificationExampleConfig::default()
    };
    let err = classification_example::run(&config, dir.path(), &mut Vec::new()).unwrap_err();
    assert!(format!("{err:#}").contains("No test samples"));
}
