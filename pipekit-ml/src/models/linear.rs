//! Ordinary least-squares linear regression with an optional ridge term.
//!
//! The fit is closed form. Inputs and target are centred on their training
//! means, the normal equations `(XᵀX + λI) w = Xᵀy` are solved by Gaussian
//! elimination with partial pivoting, and the bias is recovered from the
//! means, so it is never penalised.
//! Input columns that are constant over the training set carry no signal
//! and are given a zero weight instead of making the system singular.

use super::{Regressifier, training_event};
use crate::dataset::RegressionData;
use crate::error::{MlError, Result};
use crate::persist::ModelPersistence;
use crate::scaling::MinMaxRange;
use ndarray::{Array1, Array2, Axis, s};
use serde::{Deserialize, Serialize};

/// Relative pivot size below which the normal equations are treated as singular.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Single-output linear regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    use_scaling: bool,
    regularization: f64,
    #[serde(default)]
    training_log: bool,
    num_input_dimensions: usize,
    trained: bool,
    weights: Vec<f64>,
    bias: f64,
    input_ranges: Vec<MinMaxRange>,
    target_range: Option<MinMaxRange>,
    training_rms_error: Option<f64>,
    #[serde(skip)]
    regression_data: Vec<f64>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    /// Unscaled, unregularised model.
    pub fn new() -> Self {
        Self {
            use_scaling: false,
            regularization: 0.0,
            training_log: false,
            num_input_dimensions: 0,
            trained: false,
            weights: Vec::new(),
            bias: 0.0,
            input_ranges: Vec::new(),
            target_range: None,
            training_rms_error: None,
            regression_data: Vec::new(),
        }
    }

    /// Scale inputs and target to `[0, 1]` with the training ranges before fitting.
    pub fn with_scaling(mut self, enabled: bool) -> Self {
        self.enable_scaling(enabled);
        self
    }

    /// Ridge penalty on the weights. Negative or non-finite values are rejected.
    pub fn with_regularization(mut self, lambda: f64) -> Result<Self> {
        if !lambda.is_finite() || lambda < 0.0 {
            return Err(MlError::invalid_input(format!(
                "regularization must be a non-negative number, got {lambda}"
            )));
        }
        self.regularization = lambda;
        self.clear();
        Ok(self)
    }

    /// Changing the scaling mode invalidates a previous fit.
    pub fn enable_scaling(&mut self, enabled: bool) {
        if self.use_scaling != enabled && self.trained {
            tracing::warn!("scaling changed on a trained LinearRegression; model cleared");
            self.clear();
        }
        self.use_scaling = enabled;
    }

    pub fn use_scaling(&self) -> bool {
        self.use_scaling
    }

    pub fn regularization(&self) -> f64 {
        self.regularization
    }

    /// Learned weights in the (possibly scaled) input space.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// RMS error over the training set, in target units.
    pub fn training_rms_error(&self) -> Option<f64> {
        self.training_rms_error
    }

    fn scale_input(&self, input: &[f64]) -> Vec<f64> {
        if self.use_scaling {
            input
                .iter()
                .zip(&self.input_ranges)
                .map(|(&v, range)| range.scale(v))
                .collect()
        } else {
            input.to_vec()
        }
    }

    fn raw_output(&self, scaled_input: &[f64]) -> f64 {
        let y = self.bias
            + self
                .weights
                .iter()
                .zip(scaled_input)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        match (&self.target_range, self.use_scaling) {
            (Some(range), true) => range.unscale(y),
            _ => y,
        }
    }
}

impl Regressifier for LinearRegression {
    fn model_type(&self) -> &'static str {
        "linear_regression"
    }

    fn train(&mut self, data: &RegressionData) -> Result<()> {
        self.clear();
        if data.is_empty() {
            return Err(MlError::training("LinearRegression: training data is empty"));
        }
        if data.num_target_dimensions() != 1 {
            return Err(MlError::training(format!(
                "LinearRegression supports exactly one target dimension, got {}; \
                 wrap it in a MultidimensionalRegression",
                data.num_target_dimensions()
            )));
        }

        let m = data.num_input_dimensions();
        let input_ranges = data.input_ranges();
        let target_range = data.target_ranges()[0];

        // every non-constant input column; the bias is recovered from the means
        let active: Vec<usize> = (0..m).filter(|&j| input_ranges[j].span() > 0.0).collect();
        let n = data.num_samples();
        let mut x = Array2::<f64>::zeros((n, active.len()));
        let mut y = Array1::<f64>::zeros(n);
        for (i, sample) in data.samples().iter().enumerate() {
            let target = sample.target_vector()[0];
            y[i] = if self.use_scaling { target_range.scale(target) } else { target };
            for (c, &j) in active.iter().enumerate() {
                let v = sample.input_vector()[j];
                x[[i, c]] = if self.use_scaling { input_ranges[j].scale(v) } else { v };
            }
        }

        let (x_mean, y_mean) = match (x.mean_axis(Axis(0)), y.mean()) {
            (Some(x_mean), Some(y_mean)) => (x_mean, y_mean),
            _ => return Err(MlError::training("LinearRegression: training data is empty")),
        };
        let xc = &x - &x_mean;
        let yc = &y - y_mean;

        let mut xtx = xc.t().dot(&xc);
        let lambda = self.regularization;
        xtx.diag_mut().mapv_inplace(|v| v + lambda);
        let xty = xc.t().dot(&yc);

        let beta = solve_normal_equations(xtx, xty).ok_or_else(|| {
            MlError::training(format!(
                "LinearRegression: normal equations are singular for {n} samples and {} active inputs; \
                 add samples or set a regularization term",
                active.len()
            ))
        })?;
        let bias = y_mean - beta.dot(&x_mean);
        if !bias.is_finite() || beta.iter().any(|b| !b.is_finite()) {
            return Err(MlError::training(
                "LinearRegression: fit produced non-finite parameters",
            ));
        }

        let mut weights = vec![0.0; m];
        for (&j, &b) in active.iter().zip(beta.iter()) {
            weights[j] = b;
        }
        self.weights = weights;
        self.bias = bias;
        self.num_input_dimensions = m;
        self.input_ranges = input_ranges;
        self.target_range = Some(target_range);
        self.trained = true;

        let sse: f64 = data
            .samples()
            .iter()
            .map(|s| {
                let predicted = self.raw_output(&self.scale_input(s.input_vector()));
                (predicted - s.target_vector()[0]).powi(2)
            })
            .sum();
        let rms = (sse / data.num_samples() as f64).sqrt();
        self.training_rms_error = Some(rms);

        training_event!(
            self.training_log,
            samples = data.num_samples(),
            inputs = m,
            rms_error = rms,
            "LinearRegression trained"
        );
        Ok(())
    }

    fn predict(&mut self, input: &[f64]) -> Result<()> {
        self.regression_data.clear();
        if !self.trained {
            return Err(MlError::not_trained("LinearRegression"));
        }
        if input.len() != self.num_input_dimensions {
            return Err(MlError::dimension_mismatch(
                "LinearRegression input",
                self.num_input_dimensions,
                input.len(),
            ));
        }
        let y = self.raw_output(&self.scale_input(input));
        self.regression_data = vec![y];
        Ok(())
    }

    fn regression_data(&self) -> &[f64] {
        &self.regression_data
    }

    fn num_input_dimensions(&self) -> usize {
        self.num_input_dimensions
    }

    fn num_output_dimensions(&self) -> usize {
        if self.trained { 1 } else { 0 }
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn clear(&mut self) {
        self.trained = false;
        self.num_input_dimensions = 0;
        self.weights.clear();
        self.bias = 0.0;
        self.input_ranges.clear();
        self.target_range = None;
        self.training_rms_error = None;
        self.regression_data.clear();
    }

    fn set_training_log(&mut self, enabled: bool) {
        self.training_log = enabled;
    }
}

impl ModelPersistence for LinearRegression {
    fn persisted_type(&self) -> &'static str {
        self.model_type()
    }
}

/// Solve the symmetric system `a · w = b`.
///
/// Rows and columns are first equilibrated to a unit diagonal, so the pivot
/// tolerance does not depend on the units of the inputs. Returns `None` when
/// the system is singular.
fn solve_normal_equations(a: Array2<f64>, b: Array1<f64>) -> Option<Array1<f64>> {
    let diag = a.diag();
    if diag.iter().any(|&v| v <= 0.0 || !v.is_finite()) {
        return None;
    }
    let d = diag.mapv(|v| 1.0 / v.sqrt());
    let scaled = &a * &d.view().insert_axis(Axis(1)) * &d.view().insert_axis(Axis(0));
    let u = gaussian_elimination(scaled, &b * &d)?;
    Some(u * d)
}

/// Gaussian elimination with partial pivoting.
/// Returns `None` when a pivot vanishes relative to the matrix scale.
fn gaussian_elimination(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() <= PIVOT_TOLERANCE * scale {
            return None;
        }
        if pivot != col {
            for c in 0..n {
                a.swap([col, c], [pivot, c]);
            }
            b.swap(col, pivot);
        }

        let pivot_row = a.row(col).to_owned();
        for row in col + 1..n {
            let factor = a[[row, col]] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            a.row_mut(row).scaled_add(-factor, &pivot_row);
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail = a.slice(s![row, row + 1..]).dot(&x.slice(s![row + 1..]));
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}
