//! Adaptive naive Bayes classifier (ANBC).
//!
//! Each class is modelled as an independent Gaussian per input dimension.
//! The *distance* of a sample to a class is the weighted sum of the
//! per-dimension log-densities, so larger is closer. Class likelihoods are
//! the softmax of the distances.
//!
//! Null rejection uses the distribution of distances the class's own
//! training samples achieve: a sample whose best distance falls below
//! `mean - coeff * std` of that distribution is labelled
//! [`NULL_CLASS_LABEL`] instead of the winning class.

use super::{Classifier, training_event};
use crate::dataset::ClassificationData;
use crate::dataset::classification::NULL_CLASS_LABEL;
use crate::error::{MlError, Result};
use crate::persist::ModelPersistence;
use crate::scaling::{MinMaxRange, scale_vector};
use serde::{Deserialize, Serialize};

/// Lower bound on a per-dimension standard deviation.
pub const MIN_SIGMA: f64 = 1e-4;

/// Default null-rejection coefficient for a fresh classifier.
pub const DEFAULT_NULL_REJECTION_COEFF: f64 = 10.0;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Gaussian model of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnbcClassModel {
    pub class_label: u32,
    pub mu: Vec<f64>,
    pub sigma: Vec<f64>,
    pub weights: Vec<f64>,
    /// Mean of the distances of this class's training samples.
    pub training_mu: f64,
    /// Standard deviation of the same distances.
    pub training_sigma: f64,
    pub threshold: f64,
}

impl AnbcClassModel {
    fn fit(class_label: u32, samples: &[Vec<f64>], null_rejection_coeff: f64) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Err(MlError::training(format!("class {class_label} has no samples")));
        };
        let dims = first.len();
        let n = samples.len() as f64;

        let mut mu = vec![0.0; dims];
        for sample in samples {
            for (m, x) in mu.iter_mut().zip(sample) {
                *m += x;
            }
        }
        mu.iter_mut().for_each(|m| *m /= n);

        let mut sigma = vec![0.0; dims];
        if samples.len() > 1 {
            for sample in samples {
                for ((s, x), m) in sigma.iter_mut().zip(sample).zip(&mu) {
                    *s += (x - m).powi(2);
                }
            }
            sigma.iter_mut().for_each(|s| *s = (*s / (n - 1.0)).sqrt());
        }
        sigma.iter_mut().for_each(|s| *s = s.max(MIN_SIGMA));

        let mut model = Self {
            class_label,
            mu,
            sigma,
            weights: vec![1.0; dims],
            training_mu: 0.0,
            training_sigma: 0.0,
            threshold: 0.0,
        };

        let distances: Vec<f64> = samples.iter().map(|s| model.distance(s)).collect();
        let (mean, std) = mean_and_std(&distances);
        if !mean.is_finite() || !std.is_finite() || model.mu.iter().any(|m| !m.is_finite()) {
            return Err(MlError::training(format!(
                "class {class_label} produced non-finite parameters"
            )));
        }
        model.training_mu = mean;
        model.training_sigma = std;
        model.recompute_threshold(null_rejection_coeff);
        Ok(model)
    }

    /// Weighted sum of per-dimension Gaussian log-densities.
    pub fn distance(&self, x: &[f64]) -> f64 {
        x.iter()
            .zip(&self.mu)
            .zip(&self.sigma)
            .zip(&self.weights)
            .map(|(((x, mu), sigma), w)| {
                let z = (x - mu) / sigma;
                w * (-0.5 * z * z - sigma.ln() - LN_SQRT_2PI)
            })
            .sum()
    }

    fn recompute_threshold(&mut self, coeff: f64) {
        self.threshold = self.training_mu - coeff * self.training_sigma;
    }
}

/// Sample mean and standard deviation; the deviation is 0 for fewer than two values.
fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Adaptive naive Bayes classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anbc {
    use_scaling: bool,
    use_null_rejection: bool,
    null_rejection_coeff: f64,
    #[serde(default)]
    training_log: bool,
    num_input_dimensions: usize,
    trained: bool,
    ranges: Vec<MinMaxRange>,
    models: Vec<AnbcClassModel>,
    #[serde(skip)]
    predicted_class_label: Option<u32>,
    #[serde(skip)]
    max_likelihood: Option<f64>,
    #[serde(skip)]
    class_likelihoods: Vec<f64>,
    #[serde(skip)]
    class_distances: Vec<f64>,
}

impl Default for Anbc {
    fn default() -> Self {
        Self::new()
    }
}

impl Anbc {
    pub fn new() -> Self {
        Self {
            use_scaling: false,
            use_null_rejection: false,
            null_rejection_coeff: DEFAULT_NULL_REJECTION_COEFF,
            training_log: false,
            num_input_dimensions: 0,
            trained: false,
            ranges: Vec::new(),
            models: Vec::new(),
            predicted_class_label: None,
            max_likelihood: None,
            class_likelihoods: Vec::new(),
            class_distances: Vec::new(),
        }
    }

    pub fn with_scaling(mut self, enabled: bool) -> Self {
        self.enable_scaling(enabled);
        self
    }

    pub fn with_null_rejection(mut self, enabled: bool) -> Self {
        self.enable_null_rejection(enabled);
        self
    }

    pub fn with_null_rejection_coeff(mut self, coeff: f64) -> Result<Self> {
        self.set_null_rejection_coeff(coeff)?;
        Ok(self)
    }

    /// Scaling changes the feature space, so a trained model is cleared.
    pub fn enable_scaling(&mut self, enabled: bool) {
        if self.use_scaling != enabled && self.trained {
            tracing::warn!("scaling changed on a trained Anbc; model cleared");
            self.clear();
        }
        self.use_scaling = enabled;
    }

    pub fn enable_null_rejection(&mut self, enabled: bool) {
        self.use_null_rejection = enabled;
    }

    /// Set the rejection coefficient and refresh the thresholds of a trained model.
    pub fn set_null_rejection_coeff(&mut self, coeff: f64) -> Result<()> {
        if !coeff.is_finite() || coeff < 0.0 {
            return Err(MlError::invalid_input(format!(
                "null rejection coefficient must be a non-negative number, got {coeff}"
            )));
        }
        self.null_rejection_coeff = coeff;
        for model in &mut self.models {
            model.recompute_threshold(coeff);
        }
        Ok(())
    }

    pub fn use_scaling(&self) -> bool {
        self.use_scaling
    }

    pub fn use_null_rejection(&self) -> bool {
        self.use_null_rejection
    }

    pub fn null_rejection_coeff(&self) -> f64 {
        self.null_rejection_coeff
    }

    /// One threshold per class, in [`Classifier::class_labels`] order.
    pub fn null_rejection_thresholds(&self) -> Vec<f64> {
        self.models.iter().map(|m| m.threshold).collect()
    }

    /// Largest class likelihood of the most recent prediction.
    pub fn max_likelihood(&self) -> Option<f64> {
        self.max_likelihood
    }

    pub fn class_models(&self) -> &[AnbcClassModel] {
        &self.models
    }

    fn clear_prediction(&mut self) {
        self.predicted_class_label = None;
        self.max_likelihood = None;
        self.class_likelihoods.clear();
        self.class_distances.clear();
    }
}

impl Classifier for Anbc {
    fn model_type(&self) -> &'static str {
        "anbc"
    }

    fn train(&mut self, data: &ClassificationData) -> Result<()> {
        self.clear();
        if data.is_empty() {
            return Err(MlError::training("Anbc: training data is empty"));
        }

        let ranges = data.ranges();
        let mut models = Vec::with_capacity(data.num_classes());
        for label in data.class_labels() {
            let samples: Vec<Vec<f64>> = data
                .samples()
                .iter()
                .filter(|s| s.class_label() == label)
                .map(|s| {
                    if self.use_scaling {
                        scale_vector(s.sample(), &ranges)
                    } else {
                        s.sample().to_vec()
                    }
                })
                .collect();
            let model = AnbcClassModel::fit(label, &samples, self.null_rejection_coeff)?;
            training_event!(
                self.training_log,
                class_label = label,
                samples = samples.len(),
                training_mu = model.training_mu,
                training_sigma = model.training_sigma,
                threshold = model.threshold,
                "Anbc class model fitted"
            );
            models.push(model);
        }

        self.ranges = ranges;
        self.models = models;
        self.num_input_dimensions = data.num_dimensions();
        self.trained = true;
        training_event!(
            self.training_log,
            samples = data.num_samples(),
            classes = self.models.len(),
            "Anbc trained"
        );
        Ok(())
    }

    fn predict(&mut self, input: &[f64]) -> Result<()> {
        self.clear_prediction();
        if !self.trained {
            return Err(MlError::not_trained("Anbc"));
        }
        if input.len() != self.num_input_dimensions {
            return Err(MlError::dimension_mismatch(
                "Anbc input",
                self.num_input_dimensions,
                input.len(),
            ));
        }
        if input.iter().any(|v| !v.is_finite()) {
            return Err(MlError::invalid_input("Anbc input contains a non-finite value"));
        }

        let x = if self.use_scaling {
            scale_vector(input, &self.ranges)
        } else {
            input.to_vec()
        };
        let distances: Vec<f64> = self.models.iter().map(|m| m.distance(&x)).collect();

        let Some((best, &best_distance)) = distances
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
        else {
            return Err(MlError::state("Anbc has no class models"));
        };

        // every class density underflowed: the sample matches no class
        if !best_distance.is_finite() {
            tracing::warn!(distance = best_distance, "no class model fits the sample");
            let uniform = 1.0 / distances.len() as f64;
            self.max_likelihood = Some(uniform);
            self.predicted_class_label = Some(NULL_CLASS_LABEL);
            self.class_likelihoods = vec![uniform; distances.len()];
            self.class_distances = distances;
            return Ok(());
        }

        let exps: Vec<f64> = distances.iter().map(|d| (d - best_distance).exp()).collect();
        let total: f64 = exps.iter().sum();
        let likelihoods: Vec<f64> = exps.iter().map(|e| e / total).collect();

        let winner = &self.models[best];
        let label = if self.use_null_rejection && best_distance < winner.threshold {
            tracing::debug!(
                class_label = winner.class_label,
                distance = best_distance,
                threshold = winner.threshold,
                "sample rejected"
            );
            NULL_CLASS_LABEL
        } else {
            winner.class_label
        };

        self.max_likelihood = Some(likelihoods[best]);
        self.predicted_class_label = Some(label);
        self.class_likelihoods = likelihoods;
        self.class_distances = distances;
        Ok(())
    }

    fn predicted_class_label(&self) -> Option<u32> {
        self.predicted_class_label
    }

    fn class_likelihoods(&self) -> &[f64] {
        &self.class_likelihoods
    }

    fn class_distances(&self) -> &[f64] {
        &self.class_distances
    }

    fn class_labels(&self) -> Vec<u32> {
        self.models.iter().map(|m| m.class_label).collect()
    }

    fn num_input_dimensions(&self) -> usize {
        self.num_input_dimensions
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn clear(&mut self) {
        self.trained = false;
        self.num_input_dimensions = 0;
        self.ranges.clear();
        self.models.clear();
        self.clear_prediction();
    }

    fn set_training_log(&mut self, enabled: bool) {
        self.training_log = enabled;
    }
}

impl ModelPersistence for Anbc {
    fn persisted_type(&self) -> &'static str {
        self.model_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three well separated 2-D blobs with a small deterministic jitter.
    fn blobs() -> ClassificationData {
        let centres = [(1, [0.0, 0.0]), (2, [10.0, 0.0]), (3, [0.0, 10.0])];
        let mut data = ClassificationData::new(2);
        for (label, [cx, cy]) in centres {
            for i in 0..20 {
                let t = f64::from(i);
                let dx = (t * 1.7).sin() * 0.8;
                let dy = (t * 2.3).cos() * 0.8;
                data.add_sample(label, vec![cx + dx, cy + dy]).unwrap();
            }
        }
        data
    }

    #[test]
    fn test_classifies_blobs() {
        let mut anbc = Anbc::new();
        anbc.train(&blobs()).unwrap();
        assert_eq!(anbc.class_labels(), vec![1, 2, 3]);

        for (input, expected) in [([0.2, -0.1], 1), ([9.5, 0.4], 2), ([-0.3, 10.2], 3)] {
            anbc.predict(&input).unwrap();
            assert_eq!(anbc.predicted_class_label(), Some(expected));
            let sum: f64 = anbc.class_likelihoods().iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
            assert_eq!(anbc.class_distances().len(), 3);
            assert!(anbc.max_likelihood().unwrap() > 0.99);
        }
    }

    #[test]
    fn test_far_outlier_is_unmatched() {
        let mut anbc = Anbc::new();
        anbc.train(&blobs()).unwrap();

        anbc.predict(&[1e200, 0.0]).unwrap();
        assert_eq!(anbc.predicted_class_label(), Some(NULL_CLASS_LABEL));
        let likelihoods = anbc.class_likelihoods();
        assert_eq!(likelihoods.len(), 3);
        assert!(likelihoods.iter().all(|l| (l - 1.0 / 3.0).abs() < 1e-12));
        assert!(anbc.class_distances().iter().all(|d| *d == f64::NEG_INFINITY));
        assert!((anbc.max_likelihood().unwrap() - 1.0 / 3.0).abs() < 1e-12);

        anbc.predict(&[0.2, -0.1]).unwrap();
        assert_eq!(anbc.predicted_class_label(), Some(1));
    }

    #[test]
    fn test_null_rejection() {
        let mut anbc = Anbc::new()
            .with_scaling(true)
            .with_null_rejection(true)
            .with_null_rejection_coeff(10.0)
            .unwrap();
        anbc.train(&blobs()).unwrap();

        anbc.predict(&[0.1, 0.1]).unwrap();
        assert_eq!(anbc.predicted_class_label(), Some(1));

        anbc.predict(&[5.0, 5.0]).unwrap();
        assert_eq!(anbc.predicted_class_label(), Some(NULL_CLASS_LABEL));

        anbc.enable_null_rejection(false);
        anbc.predict(&[5.0, 5.0]).unwrap();
        assert_ne!(anbc.predicted_class_label(), Some(NULL_CLASS_LABEL));
    }

    #[test]
    fn test_coeff_updates_thresholds() {
        let mut anbc = Anbc::new();
        anbc.train(&blobs()).unwrap();
        let before = anbc.null_rejection_thresholds();
        anbc.set_null_rejection_coeff(2.0).unwrap();
        let after = anbc.null_rejection_thresholds();
        for ((b, a), m) in before.iter().zip(&after).zip(anbc.class_models()) {
            assert!(a > b);
            assert!((a - (m.training_mu - 2.0 * m.training_sigma)).abs() < 1e-12);
        }
        assert!(anbc.set_null_rejection_coeff(-1.0).is_err());
    }

    #[test]
    fn test_sigma_floor_for_constant_dimension() {
        let mut data = ClassificationData::new(2);
        for i in 0..5 {
            data.add_sample(1, vec![f64::from(i), 3.0]).unwrap();
            data.add_sample(2, vec![f64::from(i) + 20.0, 3.0]).unwrap();
        }
        let mut anbc = Anbc::new();
        anbc.train(&data).unwrap();
        assert!(anbc.class_models().iter().all(|m| m.sigma[1] == MIN_SIGMA));
        anbc.predict(&[21.0, 3.0]).unwrap();
        assert_eq!(anbc.predicted_class_label(), Some(2));
    }

    #[test]
    fn test_predict_errors() {
        let mut anbc = Anbc::new();
        assert!(matches!(anbc.predict(&[0.0, 0.0]), Err(MlError::State(_))));
        assert!(anbc.train(&ClassificationData::new(2)).is_err());

        anbc.train(&blobs()).unwrap();
        assert!(matches!(
            anbc.predict(&[0.0]),
            Err(MlError::DimensionMismatch { expected: 2, actual: 1, .. })
        ));
        assert!(anbc.predicted_class_label().is_none());
        assert!(anbc.predict(&[f64::NAN, 0.0]).is_err());
    }

    #[test]
    fn test_serde_skips_prediction_cache() {
        let mut anbc = Anbc::new().with_null_rejection(true);
        anbc.train(&blobs()).unwrap();
        anbc.predict(&[0.0, 0.0]).unwrap();

        let json = serde_json::to_string(&anbc).unwrap();
        let mut back: Anbc = serde_json::from_str(&json).unwrap();
        assert!(back.predicted_class_label().is_none());
        assert!(back.is_trained());
        back.predict(&[0.0, 0.0]).unwrap();
        assert_eq!(back.class_distances(), anbc.class_distances());
    }
}
