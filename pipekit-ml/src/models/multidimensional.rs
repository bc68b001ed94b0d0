//! Composite regressor: one single-output model per target dimension.

use super::{RegressionModel, Regressifier, training_event};
use crate::dataset::RegressionData;
use crate::error::{MlError, Result};
use crate::persist::ModelPersistence;
use crate::scaling::{MinMaxRange, scale_vector};
use serde::{Deserialize, Serialize};

/// Fits a copy of `prototype` to each target dimension and concatenates
/// their outputs at prediction time.
///
/// With scaling on, inputs and targets are mapped to `[0, 1]` using the
/// training ranges before the sub-models see them, and outputs are mapped
/// back afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultidimensionalRegression {
    use_scaling: bool,
    #[serde(default)]
    training_log: bool,
    prototype: Box<RegressionModel>,
    num_input_dimensions: usize,
    trained: bool,
    input_ranges: Vec<MinMaxRange>,
    target_ranges: Vec<MinMaxRange>,
    sub_models: Vec<RegressionModel>,
    #[serde(skip)]
    regression_data: Vec<f64>,
}

impl MultidimensionalRegression {
    pub fn new(prototype: impl Into<RegressionModel>, use_scaling: bool) -> Self {
        Self {
            use_scaling,
            training_log: false,
            prototype: Box::new(prototype.into()),
            num_input_dimensions: 0,
            trained: false,
            input_ranges: Vec::new(),
            target_ranges: Vec::new(),
            sub_models: Vec::new(),
            regression_data: Vec::new(),
        }
    }

    /// Model cloned for every target dimension.
    pub fn prototype(&self) -> &RegressionModel {
        &self.prototype
    }

    /// Replace the prototype. Any previous fit is discarded.
    pub fn set_prototype(&mut self, prototype: impl Into<RegressionModel>) {
        self.prototype = Box::new(prototype.into());
        self.clear();
    }

    /// Fitted sub-models in target-dimension order; empty until trained.
    pub fn sub_models(&self) -> &[RegressionModel] {
        &self.sub_models
    }

    pub fn use_scaling(&self) -> bool {
        self.use_scaling
    }

    pub fn enable_scaling(&mut self, enabled: bool) {
        if self.use_scaling != enabled && self.trained {
            tracing::warn!("scaling changed on a trained MultidimensionalRegression; model cleared");
            self.clear();
        }
        self.use_scaling = enabled;
    }

    fn scaled_copy(&self, data: &RegressionData) -> Result<RegressionData> {
        let mut scaled =
            RegressionData::new(data.num_input_dimensions(), data.num_target_dimensions());
        for sample in data.samples() {
            scaled.add_sample(
                scale_vector(sample.input_vector(), &self.input_ranges),
                scale_vector(sample.target_vector(), &self.target_ranges),
            )?;
        }
        Ok(scaled)
    }

    fn fit_sub_models(&self, data: &RegressionData) -> Result<Vec<RegressionModel>> {
        let mut fitted = Vec::with_capacity(data.num_target_dimensions());
        for j in 0..data.num_target_dimensions() {
            let column = data.target_column(j)?;
            let mut model = (*self.prototype).clone();
            model.clear();
            model.set_training_log(self.training_log);
            model.train(&column).map_err(|e| {
                MlError::training(format!(
                    "sub-model {} for target dimension {j} failed to train: {e}",
                    model.model_type()
                ))
            })?;
            if model.num_output_dimensions() != 1 {
                return Err(MlError::training(format!(
                    "sub-model for target dimension {j} produced {} outputs, expected 1",
                    model.num_output_dimensions()
                )));
            }
            tracing::debug!(dimension = j, model = model.model_type(), "fitted sub-model");
            fitted.push(model);
        }
        Ok(fitted)
    }
}

impl Regressifier for MultidimensionalRegression {
    fn model_type(&self) -> &'static str {
        "multidimensional_regression"
    }

    fn train(&mut self, data: &RegressionData) -> Result<()> {
        self.clear();
        if data.is_empty() {
            return Err(MlError::training(
                "MultidimensionalRegression: training data is empty",
            ));
        }

        let sub_models = if self.use_scaling {
            self.input_ranges = data.input_ranges();
            self.target_ranges = data.target_ranges();
            self.scaled_copy(data)
                .and_then(|scaled| self.fit_sub_models(&scaled))
        } else {
            self.fit_sub_models(data)
        };
        let sub_models = match sub_models {
            Ok(models) => models,
            Err(e) => {
                self.clear();
                return Err(e);
            }
        };

        self.sub_models = sub_models;
        self.num_input_dimensions = data.num_input_dimensions();
        self.trained = true;
        training_event!(
            self.training_log,
            samples = data.num_samples(),
            outputs = self.sub_models.len(),
            "MultidimensionalRegression trained"
        );
        Ok(())
    }

    fn predict(&mut self, input: &[f64]) -> Result<()> {
        self.regression_data.clear();
        if !self.trained {
            return Err(MlError::not_trained("MultidimensionalRegression"));
        }
        if input.len() != self.num_input_dimensions {
            return Err(MlError::dimension_mismatch(
                "MultidimensionalRegression input",
                self.num_input_dimensions,
                input.len(),
            ));
        }

        let input = if self.use_scaling {
            scale_vector(input, &self.input_ranges)
        } else {
            input.to_vec()
        };
        let mut output = Vec::with_capacity(self.sub_models.len());
        for model in &mut self.sub_models {
            model.predict(&input)?;
            let value = model.regression_data().first().copied().ok_or_else(|| {
                MlError::prediction(format!("{} sub-model returned no output", model.model_type()))
            })?;
            output.push(value);
        }
        if self.use_scaling {
            for (value, range) in output.iter_mut().zip(&self.target_ranges) {
                *value = range.unscale(*value);
            }
        }
        self.regression_data = output;
        Ok(())
    }

    fn regression_data(&self) -> &[f64] {
        &self.regression_data
    }

    fn num_input_dimensions(&self) -> usize {
        self.num_input_dimensions
    }

    fn num_output_dimensions(&self) -> usize {
        self.sub_models.len()
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn clear(&mut self) {
        self.trained = false;
        self.num_input_dimensions = 0;
        self.input_ranges.clear();
        self.target_ranges.clear();
        self.sub_models.clear();
        self.regression_data.clear();
    }

    fn set_training_log(&mut self, enabled: bool) {
        self.training_log = enabled;
        for model in &mut self.sub_models {
            model.set_training_log(enabled);
        }
    }
}

impl ModelPersistence for MultidimensionalRegression {
    fn persisted_type(&self) -> &'static str {
        self.model_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinearRegression;

    /// Two inputs, three linear targets.
    fn three_targets() -> RegressionData {
        let mut data = RegressionData::new(2, 3);
        for i in 0..6 {
            for j in 0..3 {
                let (a, b) = (f64::from(i), f64::from(j));
                data.add_sample(vec![a, b], vec![a + b, 2.0 * a - b + 5.0, -a])
                    .unwrap();
            }
        }
        data
    }

    #[test]
    fn test_one_sub_model_per_target() {
        let mut model = MultidimensionalRegression::new(LinearRegression::new(), true);
        model.train(&three_targets()).unwrap();

        assert_eq!(model.sub_models().len(), 3);
        assert_eq!(model.num_output_dimensions(), 3);
        assert!(model.sub_models().iter().all(|m| m.is_trained()));

        model.predict(&[2.0, 1.0]).unwrap();
        let out = model.regression_data();
        assert_eq!(out.len(), 3);
        for (got, want) in out.iter().zip([3.0, 8.0, -2.0]) {
            assert!((got - want).abs() < 1e-8, "got {got}, want {want}");
        }
    }

    #[test]
    fn test_scaled_and_unscaled_agree() {
        let data = three_targets();
        let mut scaled = MultidimensionalRegression::new(LinearRegression::new(), true);
        let mut plain = MultidimensionalRegression::new(LinearRegression::new(), false);
        scaled.train(&data).unwrap();
        plain.train(&data).unwrap();

        scaled.predict(&[4.5, -1.0]).unwrap();
        plain.predict(&[4.5, -1.0]).unwrap();
        for (a, b) in scaled.regression_data().iter().zip(plain.regression_data()) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn test_sub_model_failure_leaves_composite_untrained() {
        // x1 = 2·x0 makes the normal equations singular
        let mut data = RegressionData::new(2, 2);
        data.add_sample(vec![1.0, 2.0], vec![1.0, 0.0]).unwrap();
        data.add_sample(vec![2.0, 4.0], vec![2.0, 1.0]).unwrap();

        let mut model = MultidimensionalRegression::new(LinearRegression::new(), false);
        assert!(matches!(model.train(&data), Err(MlError::Training(_))));
        assert!(!model.is_trained());
        assert!(model.sub_models().is_empty());
        assert!(matches!(model.predict(&[1.0, 2.0]), Err(MlError::State(_))));
    }

    #[test]
    fn test_predict_checks_input_length() {
        let mut model = MultidimensionalRegression::new(LinearRegression::new(), false);
        model.train(&three_targets()).unwrap();
        model.predict(&[1.0, 2.0]).unwrap();
        assert!(matches!(
            model.predict(&[1.0, 2.0, 3.0]),
            Err(MlError::DimensionMismatch { expected: 2, actual: 3, .. })
        ));
        assert!(model.regression_data().is_empty());
    }

    #[test]
    fn test_empty_data_rejected() {
        let mut model = MultidimensionalRegression::new(LinearRegression::new(), true);
        assert!(model.train(&RegressionData::new(2, 3)).is_err());
    }
}
