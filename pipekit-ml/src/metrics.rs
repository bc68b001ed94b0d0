//! Test metrics computed by [`crate::Pipeline::test`].

use crate::dataset::classification::NULL_CLASS_LABEL;
use crate::error::{MlError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error summary of a regression test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub num_samples: usize,
    /// Sum of squared errors over every sample and output dimension.
    pub sse: f64,
    /// `sqrt(sse / (num_samples * num_dimensions))`.
    pub rms_error: f64,
    /// RMS error of each output dimension on its own.
    pub dimension_rms_errors: Vec<f64>,
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test samples: {}", self.num_samples)?;
        writeln!(f, "SSE: {}", self.sse)?;
        writeln!(f, "RMS error: {}", self.rms_error)?;
        for (j, rms) in self.dimension_rms_errors.iter().enumerate() {
            writeln!(f, "  dimension {j} RMS error: {rms}")?;
        }
        Ok(())
    }
}

/// Accumulates squared errors one prediction at a time.
#[derive(Debug, Clone)]
pub struct RegressionAccumulator {
    num_samples: usize,
    dimension_sse: Vec<f64>,
}

impl RegressionAccumulator {
    pub fn new(num_dimensions: usize) -> Self {
        Self {
            num_samples: 0,
            dimension_sse: vec![0.0; num_dimensions],
        }
    }

    pub fn add(&mut self, predicted: &[f64], target: &[f64]) -> Result<()> {
        let dims = self.dimension_sse.len();
        if predicted.len() != dims {
            return Err(MlError::dimension_mismatch("prediction", dims, predicted.len()));
        }
        if target.len() != dims {
            return Err(MlError::dimension_mismatch("test target", dims, target.len()));
        }
        for ((sse, p), t) in self.dimension_sse.iter_mut().zip(predicted).zip(target) {
            *sse += (p - t).powi(2);
        }
        self.num_samples += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<RegressionMetrics> {
        if self.num_samples == 0 || self.dimension_sse.is_empty() {
            return Err(MlError::dataset("no predictions to compute regression metrics from"));
        }
        let n = self.num_samples as f64;
        let sse: f64 = self.dimension_sse.iter().sum();
        Ok(RegressionMetrics {
            num_samples: self.num_samples,
            sse,
            rms_error: (sse / (n * self.dimension_sse.len() as f64)).sqrt(),
            dimension_rms_errors: self.dimension_sse.iter().map(|s| (s / n).sqrt()).collect(),
        })
    }
}

/// Summary of a classification test run.
///
/// `precision`, `recall` and `f_measure` are indexed like `class_labels`.
/// Confusion matrix rows are true labels in `class_labels` order; columns
/// are the predicted label, with column 0 for [`NULL_CLASS_LABEL`] followed
/// by `class_labels`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub num_samples: usize,
    pub num_correct: usize,
    pub num_rejected: usize,
    /// Fraction of samples classified correctly, in `[0, 1]`.
    pub accuracy: f64,
    pub class_labels: Vec<u32>,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub f_measure: Vec<f64>,
    pub confusion_matrix: Vec<Vec<usize>>,
}

impl ClassificationMetrics {
    pub fn accuracy_percent(&self) -> f64 {
        self.accuracy * 100.0
    }
}

impl fmt::Display for ClassificationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test samples: {}", self.num_samples)?;
        writeln!(f, "Accuracy: {}%", self.accuracy_percent())?;
        writeln!(f, "Rejected: {}", self.num_rejected)?;
        let per_class = self
            .class_labels
            .iter()
            .zip(&self.precision)
            .zip(&self.recall)
            .zip(&self.f_measure);
        for (((label, precision), recall), f_measure) in per_class {
            writeln!(
                f,
                "  class {label}: precision {precision:.4} recall {recall:.4} F-measure {f_measure:.4}"
            )?;
        }
        write!(f, "Confusion matrix (rows: true, cols: {NULL_CLASS_LABEL}")?;
        for label in &self.class_labels {
            write!(f, " {label}")?;
        }
        writeln!(f, ")")?;
        for row in &self.confusion_matrix {
            let cells: Vec<String> = row.iter().map(usize::to_string).collect();
            writeln!(f, "  {}", cells.join("\t"))?;
        }
        Ok(())
    }
}

/// Accumulates `(true, predicted)` label pairs.
#[derive(Debug, Clone)]
pub struct ClassificationAccumulator {
    class_labels: Vec<u32>,
    num_samples: usize,
    num_correct: usize,
    num_rejected: usize,
    confusion_matrix: Vec<Vec<usize>>,
}

impl ClassificationAccumulator {
    pub fn new(class_labels: Vec<u32>) -> Self {
        let k = class_labels.len();
        Self {
            class_labels,
            num_samples: 0,
            num_correct: 0,
            num_rejected: 0,
            confusion_matrix: vec![vec![0; k + 1]; k],
        }
    }

    fn column(&self, label: u32) -> Option<usize> {
        if label == NULL_CLASS_LABEL {
            return Some(0);
        }
        self.class_labels.iter().position(|&l| l == label).map(|i| i + 1)
    }

    /// Record one prediction. A true label the model never saw is counted
    /// as a miss and left out of the confusion matrix.
    pub fn add(&mut self, true_label: u32, predicted_label: u32) {
        self.num_samples += 1;
        if predicted_label == true_label {
            self.num_correct += 1;
        }
        if predicted_label == NULL_CLASS_LABEL {
            self.num_rejected += 1;
        }

        let row = self.class_labels.iter().position(|&l| l == true_label);
        match (row, self.column(predicted_label)) {
            (Some(row), Some(col)) => self.confusion_matrix[row][col] += 1,
            (None, _) => tracing::warn!(
                true_label,
                "test sample has a class label the model was not trained on"
            ),
            (Some(_), None) => tracing::warn!(
                predicted_label,
                "classifier predicted a label outside its class set"
            ),
        }
    }

    pub fn finish(self) -> Result<ClassificationMetrics> {
        if self.num_samples == 0 {
            return Err(MlError::dataset(
                "no predictions to compute classification metrics from",
            ));
        }

        let k = self.class_labels.len();
        let mut precision = Vec::with_capacity(k);
        let mut recall = Vec::with_capacity(k);
        let mut f_measure = Vec::with_capacity(k);
        for i in 0..k {
            let tp = self.confusion_matrix[i][i + 1] as f64;
            let actual: usize = self.confusion_matrix[i].iter().sum();
            let predicted: usize = self.confusion_matrix.iter().map(|row| row[i + 1]).sum();
            let p = ratio(tp, predicted);
            let r = ratio(tp, actual);
            precision.push(p);
            recall.push(r);
            f_measure.push(if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 });
        }

        Ok(ClassificationMetrics {
            num_samples: self.num_samples,
            num_correct: self.num_correct,
            num_rejected: self.num_rejected,
            accuracy: self.num_correct as f64 / self.num_samples as f64,
            class_labels: self.class_labels,
            precision,
            recall,
            f_measure,
            confusion_matrix: self.confusion_matrix,
        })
    }
}

fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}

/// Metrics of the most recent pipeline test, by model kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestMetrics {
    Regression(RegressionMetrics),
    Classification(ClassificationMetrics),
}

impl fmt::Display for TestMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regression(m) => fmt::Display::fmt(m, f),
            Self::Classification(m) => fmt::Display::fmt(m, f),
        }
    }
}
