//! Trainable models.
//!
//! Models are grouped by capability rather than by inheritance:
//!
//! - [`Regressifier`] maps an input vector to an output vector
//! - [`Classifier`] maps an input vector to a class label plus per-class scores
//!
//! Concrete algorithms are selected at construction time through the
//! serde-tagged [`RegressionModel`] and [`ClassificationModel`] enums, which
//! is also how they are told apart in persisted files.

/// Emit a training progress event: `info` when the model's training log is
/// on, `debug` otherwise.
macro_rules! training_event {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}
pub(crate) use training_event;

pub mod anbc;
pub mod linear;
pub mod multidimensional;

pub use anbc::{Anbc, AnbcClassModel};
pub use linear::LinearRegression;
pub use multidimensional::MultidimensionalRegression;

use crate::dataset::{ClassificationData, RegressionData};
use crate::error::Result;
use crate::persist::ModelPersistence;
use serde::{Deserialize, Serialize};

/// Capability set of a regression model.
pub trait Regressifier {
    /// Stable identifier, also written into persisted files.
    fn model_type(&self) -> &'static str;

    /// Fit the model, replacing any previous fit.
    fn train(&mut self, data: &RegressionData) -> Result<()>;

    /// Map `input` and cache the result for [`Regressifier::regression_data`].
    fn predict(&mut self, input: &[f64]) -> Result<()>;

    /// Output of the most recent successful `predict`; empty before that.
    fn regression_data(&self) -> &[f64];

    fn num_input_dimensions(&self) -> usize;

    fn num_output_dimensions(&self) -> usize;

    fn is_trained(&self) -> bool;

    /// Drop learned parameters and cached outputs, keeping configuration.
    fn clear(&mut self);

    fn set_training_log(&mut self, enabled: bool);
}

/// Capability set of a classification model.
pub trait Classifier {
    fn model_type(&self) -> &'static str;

    fn train(&mut self, data: &ClassificationData) -> Result<()>;

    /// Classify `input` and cache the label, likelihoods and distances.
    fn predict(&mut self, input: &[f64]) -> Result<()>;

    /// Label from the most recent `predict`; `Some(NULL_CLASS_LABEL)` when
    /// the sample was rejected, `None` before any prediction.
    fn predicted_class_label(&self) -> Option<u32>;

    /// Per-class likelihoods (sum to 1) from the most recent `predict`.
    fn class_likelihoods(&self) -> &[f64];

    /// Per-class raw scores from the most recent `predict`.
    fn class_distances(&self) -> &[f64];

    /// Labels known to the trained model, in the order of the likelihood vectors.
    fn class_labels(&self) -> Vec<u32>;

    fn num_classes(&self) -> usize {
        self.class_labels().len()
    }

    fn num_input_dimensions(&self) -> usize;

    fn is_trained(&self) -> bool;

    fn clear(&mut self);

    fn set_training_log(&mut self, enabled: bool);
}

/// Any regression model pipekit can train and persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegressionModel {
    LinearRegression(LinearRegression),
    MultidimensionalRegression(MultidimensionalRegression),
}

impl From<LinearRegression> for RegressionModel {
    fn from(model: LinearRegression) -> Self {
        Self::LinearRegression(model)
    }
}

impl From<MultidimensionalRegression> for RegressionModel {
    fn from(model: MultidimensionalRegression) -> Self {
        Self::MultidimensionalRegression(model)
    }
}

impl RegressionModel {
    fn inner(&self) -> &dyn Regressifier {
        match self {
            Self::LinearRegression(m) => m,
            Self::MultidimensionalRegression(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Regressifier {
        match self {
            Self::LinearRegression(m) => m,
            Self::MultidimensionalRegression(m) => m,
        }
    }
}

impl Regressifier for RegressionModel {
    fn model_type(&self) -> &'static str {
        self.inner().model_type()
    }

    fn train(&mut self, data: &RegressionData) -> Result<()> {
        self.inner_mut().train(data)
    }

    fn predict(&mut self, input: &[f64]) -> Result<()> {
        self.inner_mut().predict(input)
    }

    fn regression_data(&self) -> &[f64] {
        self.inner().regression_data()
    }

    fn num_input_dimensions(&self) -> usize {
        self.inner().num_input_dimensions()
    }

    fn num_output_dimensions(&self) -> usize {
        self.inner().num_output_dimensions()
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }

    fn clear(&mut self) {
        self.inner_mut().clear()
    }

    fn set_training_log(&mut self, enabled: bool) {
        self.inner_mut().set_training_log(enabled)
    }
}

impl ModelPersistence for RegressionModel {
    fn persisted_type(&self) -> &'static str {
        self.model_type()
    }
}

/// Any classification model pipekit can train and persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassificationModel {
    Anbc(Anbc),
}

impl From<Anbc> for ClassificationModel {
    fn from(model: Anbc) -> Self {
        Self::Anbc(model)
    }
}

impl ClassificationModel {
    fn inner(&self) -> &dyn Classifier {
        match self {
            Self::Anbc(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Self::Anbc(m) => m,
        }
    }
}

impl Classifier for ClassificationModel {
    fn model_type(&self) -> &'static str {
        self.inner().model_type()
    }

    fn train(&mut self, data: &ClassificationData) -> Result<()> {
        self.inner_mut().train(data)
    }

    fn predict(&mut self, input: &[f64]) -> Result<()> {
        self.inner_mut().predict(input)
    }

    fn predicted_class_label(&self) -> Option<u32> {
        self.inner().predicted_class_label()
    }

    fn class_likelihoods(&self) -> &[f64] {
        self.inner().class_likelihoods()
    }

    fn class_distances(&self) -> &[f64] {
        self.inner().class_distances()
    }

    fn class_labels(&self) -> Vec<u32> {
        self.inner().class_labels()
    }

    fn num_input_dimensions(&self) -> usize {
        self.inner().num_input_dimensions()
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }

    fn clear(&mut self) {
        self.inner_mut().clear()
    }

    fn set_training_log(&mut self, enabled: bool) {
        self.inner_mut().set_training_log(enabled)
    }
}

impl ModelPersistence for ClassificationModel {
    fn persisted_type(&self) -> &'static str {
        self.model_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_model_tagging() {
        let model: RegressionModel = LinearRegression::new().into();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["type"], "linear_regression");

        let composite: RegressionModel =
            MultidimensionalRegression::new(LinearRegression::new(), true).into();
        let json = serde_json::to_value(&composite).unwrap();
        assert_eq!(json["type"], "multidimensional_regression");
        assert_eq!(json["prototype"]["type"], "linear_regression");

        let back: RegressionModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, composite);
    }

    #[test]
    fn test_enum_dispatch() {
        let mut model: RegressionModel = LinearRegression::new().into();
        assert_eq!(model.model_type(), "linear_regression");
        assert!(!model.is_trained());
        assert!(model.predict(&[1.0]).is_err());

        let classifier: ClassificationModel = Anbc::new().into();
        assert_eq!(classifier.model_type(), "anbc");
        assert_eq!(classifier.num_classes(), 0);
        assert!(classifier.predicted_class_label().is_none());
    }
}
