//! Min-max ranges and the `[0, 1]` scaling used by models with scaling enabled.
//!
//! ```text
//! scaled = (x - min) / (max - min)
//! ```
//!
//! A constant column (`max == min`) scales to `0.0` and unscales back to `min`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Observed minimum and maximum of one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxRange {
    pub min: f64,
    pub max: f64,
}

impl MinMaxRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Widen the range to include `value`.
    pub fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Map `value` from this range onto `[0, 1]`. Values outside the range
    /// extrapolate linearly rather than clamping.
    pub fn scale(&self, value: f64) -> f64 {
        let span = self.span();
        if span == 0.0 {
            0.0
        } else {
            (value - self.min) / span
        }
    }

    /// Inverse of [`MinMaxRange::scale`].
    pub fn unscale(&self, value: f64) -> f64 {
        self.min + value * self.span()
    }
}

impl fmt::Display for MinMaxRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Column-wise ranges over `rows`, each `dims` wide. Empty input yields `[0, 0]` ranges.
pub fn column_ranges<'a, I>(rows: I, dims: usize) -> Vec<MinMaxRange>
where
    I: IntoIterator<Item = &'a [f64]>,
{
    let mut ranges: Option<Vec<MinMaxRange>> = None;
    for row in rows {
        match ranges.as_mut() {
            None => {
                ranges = Some(row.iter().map(|&v| MinMaxRange::new(v, v)).collect());
            }
            Some(ranges) => {
                for (range, &v) in ranges.iter_mut().zip(row) {
                    range.include(v);
                }
            }
        }
    }
    ranges.unwrap_or_else(|| vec![MinMaxRange::new(0.0, 0.0); dims])
}

/// Scale every element of `values` by the matching range.
pub fn scale_vector(values: &[f64], ranges: &[MinMaxRange]) -> Vec<f64> {
    values
        .iter()
        .zip(ranges)
        .map(|(&v, range)| range.scale(v))
        .collect()
}
