//! Pipeline: owns one model and drives train / test / predict / persist.
//!
//! ```text
//! Unconfigured ──set_regressifier / set_classifier──▶ Configured ──train──▶ Trained
//!       ▲                                                                │
//!       └──────────────── (model replaced: back to Configured) ◀─────────┘
//! ```

use crate::dataset::{ClassificationData, DatasetRef, RegressionData};
use crate::error::{MlError, Result};
use crate::metrics::{
    ClassificationAccumulator, ClassificationMetrics, RegressionAccumulator, RegressionMetrics,
    TestMetrics,
};
use crate::models::{ClassificationModel, Classifier, RegressionModel, Regressifier, training_event};
use crate::persist::{PIPELINE_FORMAT, read_envelope, write_envelope};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};

/// The model a pipeline drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum PipelineModel {
    Regression(RegressionModel),
    Classification(ClassificationModel),
}

impl PipelineModel {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Regression(_) => "regression",
            Self::Classification(_) => "classification",
        }
    }

    pub fn model_type(&self) -> &'static str {
        match self {
            Self::Regression(m) => m.model_type(),
            Self::Classification(m) => m.model_type(),
        }
    }

    pub fn is_trained(&self) -> bool {
        match self {
            Self::Regression(m) => m.is_trained(),
            Self::Classification(m) => m.is_trained(),
        }
    }

    fn set_training_log(&mut self, enabled: bool) {
        match self {
            Self::Regression(m) => m.set_training_log(enabled),
            Self::Classification(m) => m.set_training_log(enabled),
        }
    }
}

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Unconfigured,
    Configured,
    Trained,
}

/// Persisted pipeline contents.
#[derive(Debug, Serialize, Deserialize)]
struct PipelineFile {
    training_log: bool,
    model: PipelineModel,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    model: Option<PipelineModel>,
    training_log: bool,
    test_metrics: Option<TestMetrics>,
    training_time: Option<Duration>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a regression model, replacing any previous model.
    pub fn set_regressifier(&mut self, model: impl Into<RegressionModel>) {
        self.attach(PipelineModel::Regression(model.into()));
    }

    /// Attach a classification model, replacing any previous model.
    pub fn set_classifier(&mut self, model: impl Into<ClassificationModel>) {
        self.attach(PipelineModel::Classification(model.into()));
    }

    fn attach(&mut self, mut model: PipelineModel) {
        model.set_training_log(self.training_log);
        tracing::debug!(model = model.model_type(), "model attached to pipeline");
        self.model = Some(model);
        self.test_metrics = None;
        self.training_time = None;
    }

    /// Turn the training progress log on or off for the attached model and
    /// any model attached later.
    pub fn enable_training_log(&mut self, enabled: bool) {
        self.training_log = enabled;
        if let Some(model) = self.model.as_mut() {
            model.set_training_log(enabled);
        }
    }

    pub fn training_log(&self) -> bool {
        self.training_log
    }

    pub fn model(&self) -> Option<&PipelineModel> {
        self.model.as_ref()
    }

    pub fn regressifier(&self) -> Option<&RegressionModel> {
        match &self.model {
            Some(PipelineModel::Regression(m)) => Some(m),
            _ => None,
        }
    }

    pub fn classifier(&self) -> Option<&ClassificationModel> {
        match &self.model {
            Some(PipelineModel::Classification(m)) => Some(m),
            _ => None,
        }
    }

    pub fn state(&self) -> PipelineState {
        match &self.model {
            None => PipelineState::Unconfigured,
            Some(m) if m.is_trained() => PipelineState::Trained,
            Some(_) => PipelineState::Configured,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state() == PipelineState::Trained
    }

    /// Wall-clock duration of the last successful `train`.
    pub fn training_time(&self) -> Option<Duration> {
        self.training_time
    }

    fn model_mut(&mut self) -> Result<&mut PipelineModel> {
        self.model
            .as_mut()
            .ok_or_else(|| MlError::state("pipeline has no model attached"))
    }

    fn kind_mismatch(model: &PipelineModel, data: DatasetRef<'_>) -> MlError {
        MlError::state(format!(
            "{} model {} cannot be used with {} data",
            model.kind(),
            model.model_type(),
            data.kind()
        ))
    }

    /// Train the attached model on `data`.
    pub fn train<'a>(&mut self, data: impl Into<DatasetRef<'a>>) -> Result<()> {
        let data = data.into();
        self.test_metrics = None;
        self.training_time = None;
        let training_log = self.training_log;
        let model = self.model_mut()?;

        let start = Instant::now();
        match (&mut *model, data) {
            (PipelineModel::Regression(m), DatasetRef::Regression(d)) => m.train(d)?,
            (PipelineModel::Classification(m), DatasetRef::Classification(d)) => m.train(d)?,
            (model, data) => return Err(Self::kind_mismatch(model, data)),
        }
        let elapsed = start.elapsed();

        training_event!(
            training_log,
            model = model.model_type(),
            samples = data.num_samples(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "pipeline trained"
        );
        self.training_time = Some(elapsed);
        Ok(())
    }

    /// Predict every sample of `data` and record the test metrics.
    ///
    /// Previous metrics are cleared first, so a failed test leaves none behind.
    pub fn test<'a>(&mut self, data: impl Into<DatasetRef<'a>>) -> Result<()> {
        let data = data.into();
        self.test_metrics = None;
        let model = self.model_mut()?;
        if !model.is_trained() {
            return Err(MlError::not_trained("pipeline model"));
        }
        if data.num_samples() == 0 {
            return Err(MlError::dataset("test data is empty"));
        }

        let metrics = match (&mut *model, data) {
            (PipelineModel::Regression(m), DatasetRef::Regression(d)) => {
                TestMetrics::Regression(test_regression(m, d)?)
            }
            (PipelineModel::Classification(m), DatasetRef::Classification(d)) => {
                TestMetrics::Classification(test_classification(m, d)?)
            }
            (model, data) => return Err(Self::kind_mismatch(model, data)),
        };
        tracing::debug!(samples = data.num_samples(), "pipeline tested");
        self.test_metrics = Some(metrics);
        Ok(())
    }

    /// Run the attached model on `input`; read the result through the
    /// output accessors.
    pub fn predict(&mut self, input: &[f64]) -> Result<()> {
        match self.model_mut()? {
            PipelineModel::Regression(m) => m.predict(input),
            PipelineModel::Classification(m) => m.predict(input),
        }
    }

    /// Regression output of the last `predict`; empty for classifiers.
    pub fn regression_data(&self) -> &[f64] {
        match &self.model {
            Some(PipelineModel::Regression(m)) => m.regression_data(),
            _ => &[],
        }
    }

    pub fn predicted_class_label(&self) -> Option<u32> {
        self.classifier().and_then(|m| m.predicted_class_label())
    }

    pub fn class_likelihoods(&self) -> &[f64] {
        match &self.model {
            Some(PipelineModel::Classification(m)) => m.class_likelihoods(),
            _ => &[],
        }
    }

    pub fn class_distances(&self) -> &[f64] {
        match &self.model {
            Some(PipelineModel::Classification(m)) => m.class_distances(),
            _ => &[],
        }
    }

    pub fn test_metrics(&self) -> Option<&TestMetrics> {
        self.test_metrics.as_ref()
    }

    fn regression_metrics(&self) -> Option<&RegressionMetrics> {
        match &self.test_metrics {
            Some(TestMetrics::Regression(m)) => Some(m),
            _ => None,
        }
    }

    fn classification_metrics(&self) -> Option<&ClassificationMetrics> {
        match &self.test_metrics {
            Some(TestMetrics::Classification(m)) => Some(m),
            _ => None,
        }
    }

    pub fn test_rms_error(&self) -> Option<f64> {
        self.regression_metrics().map(|m| m.rms_error)
    }

    pub fn test_sse(&self) -> Option<f64> {
        self.regression_metrics().map(|m| m.sse)
    }

    /// Fraction of test samples classified correctly.
    pub fn test_accuracy(&self) -> Option<f64> {
        self.classification_metrics().map(|m| m.accuracy)
    }

    /// Write the attached model and pipeline settings to `path`.
    pub fn save_pipeline_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| MlError::state("cannot save a pipeline with no model attached"))?;
        let file = PipelineFile {
            training_log: self.training_log,
            model: model.clone(),
        };
        write_envelope(path.as_ref(), PIPELINE_FORMAT, model.model_type(), &file)
    }

    /// Replace this pipeline's model and settings with those stored at
    /// `path`. Cached outputs and metrics are cleared. On error the
    /// pipeline is left unchanged.
    pub fn load_pipeline_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let (model_type, file): (String, PipelineFile) = read_envelope(path, PIPELINE_FORMAT)?;
        if file.model.model_type() != model_type {
            return Err(MlError::model(format!(
                "{}: header says {model_type} but payload is {}",
                path.display(),
                file.model.model_type()
            )));
        }
        tracing::debug!(path = %path.display(), model = model_type, "pipeline loaded");
        self.training_log = file.training_log;
        self.model = Some(file.model);
        self.test_metrics = None;
        self.training_time = None;
        Ok(())
    }
}

fn test_regression(model: &mut RegressionModel, data: &RegressionData) -> Result<RegressionMetrics> {
    if data.num_input_dimensions() != model.num_input_dimensions() {
        return Err(MlError::dimension_mismatch(
            "test input",
            model.num_input_dimensions(),
            data.num_input_dimensions(),
        ));
    }
    if data.num_target_dimensions() != model.num_output_dimensions() {
        return Err(MlError::dimension_mismatch(
            "test target",
            model.num_output_dimensions(),
            data.num_target_dimensions(),
        ));
    }

    let mut acc = RegressionAccumulator::new(data.num_target_dimensions());
    for sample in data.samples() {
        model.predict(sample.input_vector())?;
        acc.add(model.regression_data(), sample.target_vector())?;
    }
    acc.finish()
}

fn test_classification(
    model: &mut ClassificationModel,
    data: &ClassificationData,
) -> Result<ClassificationMetrics> {
    if data.num_dimensions() != model.num_input_dimensions() {
        return Err(MlError::dimension_mismatch(
            "test input",
            model.num_input_dimensions(),
            data.num_dimensions(),
        ));
    }

    let mut acc = ClassificationAccumulator::new(model.class_labels());
    for sample in data.samples() {
        model.predict(sample.sample())?;
        let predicted = model
            .predicted_class_label()
            .ok_or_else(|| MlError::prediction("classifier produced no label"))?;
        acc.add(sample.class_label(), predicted);
    }
    acc.finish()
}
