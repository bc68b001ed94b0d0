//! Regression datasets: input vectors paired with target vectors.

use super::{
    DATA_MARKER, TextReader, check_finite, check_percent, keep_mask, parse_fields, push_fields,
    seeded_rng, split_by_mask,
};
use crate::error::{MlError, Result};
use crate::scaling::{MinMaxRange, column_ranges};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;
use std::path::Path;

const FILE_HEADER: &str = "PIPEKIT_REGRESSION_DATA_V1";

/// One input vector and the target vector it should map to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSample {
    input: Vec<f64>,
    target: Vec<f64>,
}

impl RegressionSample {
    pub fn new(input: Vec<f64>, target: Vec<f64>) -> Self {
        Self { input, target }
    }

    pub fn input_vector(&self) -> &[f64] {
        &self.input
    }

    pub fn target_vector(&self) -> &[f64] {
        &self.target
    }
}

/// An ordered set of regression samples with fixed input/target dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionData {
    dataset_name: String,
    info_text: String,
    num_input_dimensions: usize,
    num_target_dimensions: usize,
    samples: Vec<RegressionSample>,
}

impl RegressionData {
    /// Create an empty dataset with the given dimensionality.
    pub fn new(num_input_dimensions: usize, num_target_dimensions: usize) -> Self {
        Self {
            dataset_name: "NOT_SET".to_string(),
            info_text: String::new(),
            num_input_dimensions,
            num_target_dimensions,
            samples: Vec::new(),
        }
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

    /// Dataset names are written as a single header token, so whitespace is rejected.
    pub fn set_dataset_name(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(MlError::invalid_input(format!(
                "dataset name must be a non-empty single word, got '{name}'"
            )));
        }
        self.dataset_name = name;
        Ok(())
    }

    pub fn info_text(&self) -> &str {
        &self.info_text
    }

    pub fn set_info_text(&mut self, text: impl Into<String>) {
        // one header line; newlines would break the file layout
        self.info_text = text.into().replace(['\n', '\r'], " ").trim().to_string();
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_input_dimensions(&self) -> usize {
        self.num_input_dimensions
    }

    pub fn num_target_dimensions(&self) -> usize {
        self.num_target_dimensions
    }

    pub fn samples(&self) -> &[RegressionSample] {
        &self.samples
    }

    pub fn get(&self, index: usize) -> Option<&RegressionSample> {
        self.samples.get(index)
    }

    /// Append a sample; both vectors must match the dataset's dimensionality.
    pub fn add_sample(&mut self, input: Vec<f64>, target: Vec<f64>) -> Result<()> {
        if input.len() != self.num_input_dimensions {
            return Err(MlError::dimension_mismatch(
                "regression sample input",
                self.num_input_dimensions,
                input.len(),
            ));
        }
        if target.len() != self.num_target_dimensions {
            return Err(MlError::dimension_mismatch(
                "regression sample target",
                self.num_target_dimensions,
                target.len(),
            ));
        }
        check_finite(&input, "input vector")?;
        check_finite(&target, "target vector")?;
        self.samples.push(RegressionSample::new(input, target));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn input_ranges(&self) -> Vec<MinMaxRange> {
        column_ranges(
            self.samples.iter().map(|s| s.input.as_slice()),
            self.num_input_dimensions,
        )
    }

    pub fn target_ranges(&self) -> Vec<MinMaxRange> {
        column_ranges(
            self.samples.iter().map(|s| s.target.as_slice()),
            self.num_target_dimensions,
        )
    }

    /// A single-target dataset holding every input vector and target dimension `index`.
    pub fn target_column(&self, index: usize) -> Result<RegressionData> {
        if index >= self.num_target_dimensions {
            return Err(MlError::invalid_input(format!(
                "target dimension {index} out of range for {} target dimensions",
                self.num_target_dimensions
            )));
        }
        let mut column = RegressionData::new(self.num_input_dimensions, 1);
        column.dataset_name = self.dataset_name.clone();
        column.samples = self
            .samples
            .iter()
            .map(|s| RegressionSample::new(s.input.clone(), vec![s.target[index]]))
            .collect();
        Ok(column)
    }

    /// Keep `percent_train`% of the samples (seeded shuffle) and return the rest.
    ///
    /// Both halves keep the original relative order of their samples.
    pub fn partition(&mut self, percent_train: f64, seed: u64) -> Result<RegressionData> {
        check_percent(percent_train)?;
        let mask = keep_mask(self.samples.len(), percent_train, &mut seeded_rng(seed));
        let (kept, rest) = split_by_mask(std::mem::take(&mut self.samples), &mask);
        self.samples = kept;

        let mut remainder = RegressionData::new(self.num_input_dimensions, self.num_target_dimensions);
        remainder.dataset_name = self.dataset_name.clone();
        remainder.info_text = self.info_text.clone();
        remainder.samples = rest;
        tracing::debug!(
            kept = self.samples.len(),
            returned = remainder.samples.len(),
            "partitioned regression data"
        );
        Ok(remainder)
    }

    /// Parse a dataset file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let data = Self::parse(path, &content)?;
        tracing::debug!(
            path = %path.display(),
            samples = data.num_samples(),
            inputs = data.num_input_dimensions,
            targets = data.num_target_dimensions,
            "loaded regression data"
        );
        Ok(data)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut reader = TextReader::new(path, content);
        reader.expect_line(FILE_HEADER)?;
        let name = reader.header_value("DatasetName")?;
        let info = reader.header_value("InfoText")?;
        let num_inputs: usize = reader.header_parse("NumInputDimensions")?;
        let num_targets: usize = reader.header_parse("NumTargetDimensions")?;
        let declared: usize = reader.header_parse("NumSamples")?;
        reader.expect_line(DATA_MARKER)?;

        if num_inputs == 0 || num_targets == 0 {
            return Err(MlError::dataset(format!(
                "{}: input and target dimensionality must be at least 1",
                path.display()
            )));
        }

        let mut data = RegressionData::new(num_inputs, num_targets);
        data.dataset_name = if name.is_empty() { "NOT_SET".into() } else { name.into() };
        data.info_text = info.to_string();

        let width = num_inputs + num_targets;
        let parse_error = |line: usize, message: String| MlError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };
        for (line_no, line) in reader.rows() {
            let mut fields = parse_fields(line).map_err(|m| parse_error(line_no, m))?;
            if fields.len() != width {
                return Err(parse_error(
                    line_no,
                    format!("expected {width} fields, found {}", fields.len()),
                ));
            }
            let target = fields.split_off(num_inputs);
            data.add_sample(fields, target)
                .map_err(|e| parse_error(line_no, e.to_string()))?;
        }

        if data.samples.len() != declared {
            return Err(MlError::dataset(format!(
                "{}: header declares {declared} samples but {} were found",
                path.display(),
                data.samples.len()
            )));
        }
        if data.is_empty() {
            return Err(MlError::dataset(format!(
                "{}: dataset contains no samples",
                path.display()
            )));
        }
        Ok(data)
    }

    /// Write the dataset in the text format read by [`RegressionData::load`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut out = String::new();
        out.push_str(FILE_HEADER);
        out.push('\n');
        out.push_str(&format!("DatasetName: {}\n", self.dataset_name));
        out.push_str(&format!("InfoText: {}\n", self.info_text));
        out.push_str(&format!("NumInputDimensions: {}\n", self.num_input_dimensions));
        out.push_str(&format!("NumTargetDimensions: {}\n", self.num_target_dimensions));
        out.push_str(&format!("NumSamples: {}\n", self.samples.len()));
        out.push_str(DATA_MARKER);
        out.push('\n');
        for sample in &self.samples {
            push_fields(&mut out, &sample.input);
            out.push('\t');
            push_fields(&mut out, &sample.target);
            out.push('\n');
        }
        pipekit_core::persistence::atomic_write(path, out.as_bytes())?;
        Ok(())
    }

    pub fn stats(&self) -> RegressionStats {
        RegressionStats {
            dataset_name: self.dataset_name.clone(),
            num_samples: self.samples.len(),
            num_input_dimensions: self.num_input_dimensions,
            num_target_dimensions: self.num_target_dimensions,
            input_ranges: self.input_ranges(),
            target_ranges: self.target_ranges(),
        }
    }

    /// Print [`RegressionData::stats`] to stdout.
    pub fn print_stats(&self) {
        print!("{}", self.stats());
    }
}

impl Index<usize> for RegressionData {
    type Output = RegressionSample;

    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

/// Summary of a regression dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionStats {
    pub dataset_name: String,
    pub num_samples: usize,
    pub num_input_dimensions: usize,
    pub num_target_dimensions: usize,
    pub input_ranges: Vec<MinMaxRange>,
    pub target_ranges: Vec<MinMaxRange>,
}

impl fmt::Display for RegressionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DatasetName:\t{}", self.dataset_name)?;
        writeln!(f, "NumberOfSamples:\t{}", self.num_samples)?;
        writeln!(f, "NumInputDimensions:\t{}", self.num_input_dimensions)?;
        writeln!(f, "NumTargetDimensions:\t{}", self.num_target_dimensions)?;
        writeln!(f, "InputRanges:")?;
        for (i, range) in self.input_ranges.iter().enumerate() {
            writeln!(f, "  [{}] min: {}\tmax: {}", i + 1, range.min, range.max)?;
        }
        writeln!(f, "TargetRanges:")?;
        for (i, range) in self.target_ranges.iter().enumerate() {
            writeln!(f, "  [{}] min: {}\tmax: {}", i + 1, range.min, range.max)?;
        }
        Ok(())
    }
}
