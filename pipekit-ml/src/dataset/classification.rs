//! Labelled classification datasets.

use super::{
    DATA_MARKER, TextReader, check_finite, check_percent, keep_mask, parse_fields, push_fields,
    seeded_rng, split_by_mask,
};
use crate::error::{MlError, Result};
use crate::scaling::{MinMaxRange, column_ranges};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::path::Path;

const FILE_HEADER: &str = "PIPEKIT_CLASSIFICATION_DATA_V1";

/// Label reserved for "no confident class". Never valid in a dataset.
pub const NULL_CLASS_LABEL: u32 = 0;

/// A feature vector and its class label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationSample {
    class_label: u32,
    sample: Vec<f64>,
}

impl ClassificationSample {
    pub fn new(class_label: u32, sample: Vec<f64>) -> Self {
        Self {
            class_label,
            sample,
        }
    }

    pub fn class_label(&self) -> u32 {
        self.class_label
    }

    pub fn sample(&self) -> &[f64] {
        &self.sample
    }
}

/// An ordered set of labelled samples with fixed dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationData {
    dataset_name: String,
    info_text: String,
    num_dimensions: usize,
    samples: Vec<ClassificationSample>,
}

impl ClassificationData {
    pub fn new(num_dimensions: usize) -> Self {
        Self {
            dataset_name: "NOT_SET".to_string(),
            info_text: String::new(),
            num_dimensions,
            samples: Vec::new(),
        }
    }

    pub fn dataset_name(&self) -> &str {
        &self.dataset_name
    }

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
        self.info_text = text.into().replace(['\n', '\r'], " ").trim().to_string();
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    pub fn samples(&self) -> &[ClassificationSample] {
        &self.samples
    }

    pub fn get(&self, index: usize) -> Option<&ClassificationSample> {
        self.samples.get(index)
    }

    /// Number of samples per class label, ordered by label.
    pub fn class_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for sample in &self.samples {
            *counts.entry(sample.class_label).or_insert(0) += 1;
        }
        counts
    }

    /// Distinct class labels in ascending order.
    pub fn class_labels(&self) -> Vec<u32> {
        self.class_counts().into_keys().collect()
    }

    pub fn num_classes(&self) -> usize {
        self.class_counts().len()
    }

    /// Append a sample. Label 0 is reserved for the null class and rejected.
    pub fn add_sample(&mut self, class_label: u32, sample: Vec<f64>) -> Result<()> {
        if class_label == NULL_CLASS_LABEL {
            return Err(MlError::dataset(format!(
                "class label {NULL_CLASS_LABEL} is reserved for the null class"
            )));
        }
        if sample.len() != self.num_dimensions {
            return Err(MlError::dimension_mismatch(
                "classification sample",
                self.num_dimensions,
                sample.len(),
            ));
        }
        check_finite(&sample, "sample")?;
        self.samples.push(ClassificationSample::new(class_label, sample));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Per-dimension min/max over all samples.
    pub fn ranges(&self) -> Vec<MinMaxRange> {
        column_ranges(
            self.samples.iter().map(|s| s.sample.as_slice()),
            self.num_dimensions,
        )
    }

    /// Keep `percent_train`% of the samples (seeded shuffle over the whole
    /// set) and return the rest.
    pub fn partition(&mut self, percent_train: f64, seed: u64) -> Result<ClassificationData> {
        check_percent(percent_train)?;
        let mask = keep_mask(self.samples.len(), percent_train, &mut seeded_rng(seed));
        Ok(self.split_off_unmasked(&mask))
    }

    /// Like [`ClassificationData::partition`], but the split is applied to
    /// each class on its own so both halves keep the class proportions.
    pub fn partition_stratified(
        &mut self,
        percent_train: f64,
        seed: u64,
    ) -> Result<ClassificationData> {
        check_percent(percent_train)?;
        let mut rng = seeded_rng(seed);
        let mut mask = vec![false; self.samples.len()];
        for label in self.class_labels() {
            let members: Vec<usize> = self
                .samples
                .iter()
                .enumerate()
                .filter(|(_, s)| s.class_label == label)
                .map(|(i, _)| i)
                .collect();
            let class_mask = keep_mask(members.len(), percent_train, &mut rng);
            for (&idx, keep) in members.iter().zip(class_mask) {
                mask[idx] = keep;
            }
        }
        Ok(self.split_off_unmasked(&mask))
    }

    fn split_off_unmasked(&mut self, mask: &[bool]) -> ClassificationData {
        let (kept, rest) = split_by_mask(std::mem::take(&mut self.samples), mask);
        self.samples = kept;

        let mut remainder = ClassificationData::new(self.num_dimensions);
        remainder.dataset_name = self.dataset_name.clone();
        remainder.info_text = self.info_text.clone();
        remainder.samples = rest;
        tracing::debug!(
            kept = self.samples.len(),
            returned = remainder.samples.len(),
            "partitioned classification data"
        );
        remainder
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let data = Self::parse(path, &content)?;
        tracing::debug!(
            path = %path.display(),
            samples = data.num_samples(),
            dimensions = data.num_dimensions,
            classes = data.num_classes(),
            "loaded classification data"
        );
        Ok(data)
    }

    fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut reader = TextReader::new(path, content);
        reader.expect_line(FILE_HEADER)?;
        let name = reader.header_value("DatasetName")?;
        let info = reader.header_value("InfoText")?;
        let num_dimensions: usize = reader.header_parse("NumDimensions")?;
        let declared_samples: usize = reader.header_parse("NumSamples")?;
        let declared_classes: usize = reader.header_parse("NumClasses")?;
        reader.expect_line("ClassIDsAndCounters:")?;
        let mut declared_counts = BTreeMap::new();
        for _ in 0..declared_classes {
            let (line_no, line) = reader.next_line("a class counter")?;
            let mut fields = line.split_whitespace();
            let parsed = match (fields.next(), fields.next(), fields.next()) {
                (Some(label), Some(count), None) => {
                    label.parse::<u32>().ok().zip(count.parse::<usize>().ok())
                }
                _ => None,
            };
            let (label, count) = parsed.ok_or_else(|| {
                reader.error(line_no, format!("expected '<label> <count>', found '{line}'"))
            })?;
            declared_counts.insert(label, count);
        }
        reader.expect_line(DATA_MARKER)?;

        if num_dimensions == 0 {
            return Err(MlError::dataset(format!(
                "{}: dimensionality must be at least 1",
                path.display()
            )));
        }

        let mut data = ClassificationData::new(num_dimensions);
        data.dataset_name = if name.is_empty() { "NOT_SET".into() } else { name.into() };
        data.info_text = info.to_string();

        let parse_error = |line: usize, message: String| MlError::Parse {
            path: path.to_path_buf(),
            line,
            message,
        };
        for (line_no, line) in reader.rows() {
            let (label, rest) = line
                .split_once(char::is_whitespace)
                .unwrap_or((line, ""));
            let label: u32 = label
                .parse()
                .map_err(|_| parse_error(line_no, format!("'{label}' is not a class label")))?;
            let sample = parse_fields(rest).map_err(|m| parse_error(line_no, m))?;
            if sample.len() != num_dimensions {
                return Err(parse_error(
                    line_no,
                    format!("expected {num_dimensions} features, found {}", sample.len()),
                ));
            }
            data.add_sample(label, sample)
                .map_err(|e| parse_error(line_no, e.to_string()))?;
        }

        if data.samples.len() != declared_samples {
            return Err(MlError::dataset(format!(
                "{}: header declares {declared_samples} samples but {} were found",
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
        if data.class_counts() != declared_counts {
            return Err(MlError::dataset(format!(
                "{}: class counters in the header do not match the data",
                path.display()
            )));
        }
        Ok(data)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let counts = self.class_counts();
        let mut out = String::new();
        out.push_str(FILE_HEADER);
        out.push('\n');
        out.push_str(&format!("DatasetName: {}\n", self.dataset_name));
        out.push_str(&format!("InfoText: {}\n", self.info_text));
        out.push_str(&format!("NumDimensions: {}\n", self.num_dimensions));
        out.push_str(&format!("NumSamples: {}\n", self.samples.len()));
        out.push_str(&format!("NumClasses: {}\n", counts.len()));
        out.push_str("ClassIDsAndCounters:\n");
        for (label, count) in &counts {
            out.push_str(&format!("{label}\t{count}\n"));
        }
        out.push_str(DATA_MARKER);
        out.push('\n');
        for sample in &self.samples {
            out.push_str(&sample.class_label.to_string());
            out.push('\t');
            push_fields(&mut out, &sample.sample);
            out.push('\n');
        }
        pipekit_core::persistence::atomic_write(path.as_ref(), out.as_bytes())?;
        Ok(())
    }

    pub fn stats(&self) -> ClassificationStats {
        ClassificationStats {
            dataset_name: self.dataset_name.clone(),
            num_samples: self.samples.len(),
            num_dimensions: self.num_dimensions,
            class_counts: self.class_counts().into_iter().collect(),
            ranges: self.ranges(),
        }
    }

    /// Print [`ClassificationData::stats`] to stdout.
    pub fn print_stats(&self) {
        print!("{}", self.stats());
    }
}

impl Index<usize> for ClassificationData {
    type Output = ClassificationSample;

    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

/// Summary of a classification dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationStats {
    pub dataset_name: String,
    pub num_samples: usize,
    pub num_dimensions: usize,
    /// `(label, count)` pairs in ascending label order.
    pub class_counts: Vec<(u32, usize)>,
    pub ranges: Vec<MinMaxRange>,
}

impl fmt::Display for ClassificationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "DatasetName:\t{}", self.dataset_name)?;
        writeln!(f, "NumberOfSamples:\t{}", self.num_samples)?;
        writeln!(f, "NumDimensions:\t{}", self.num_dimensions)?;
        writeln!(f, "NumberOfClasses:\t{}", self.class_counts.len())?;
        writeln!(f, "ClassStats:")?;
        for (label, count) in &self.class_counts {
            writeln!(f, "  ClassLabel: {label}\tNumberOfSamples: {count}")?;
        }
        writeln!(f, "DatasetRanges:")?;
        for (i, range) in self.ranges.iter().enumerate() {
            writeln!(f, "  [{}] min: {}\tmax: {}", i + 1, range.min, range.max)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn three_classes() -> ClassificationData {
        let mut data = ClassificationData::new(2);
        for i in 0..30u32 {
            let label = i % 3 + 1;
            let x = f64::from(i);
            data.add_sample(label, vec![x, f64::from(label) * 10.0]).unwrap();
        }
        data
    }

    #[test]
    fn test_add_sample_validation() {
        let mut data = ClassificationData::new(3);
        assert!(matches!(
            data.add_sample(NULL_CLASS_LABEL, vec![0.0; 3]),
            Err(MlError::Dataset(_))
        ));
        assert!(matches!(
            data.add_sample(1, vec![0.0; 2]),
            Err(MlError::DimensionMismatch { expected: 3, actual: 2, .. })
        ));
        data.add_sample(2, vec![1.0, 2.0, 3.0]).unwrap();
        data.add_sample(5, vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(data.class_labels(), vec![2, 5]);
        assert_eq!(data.num_classes(), 2);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("classes.txt");
        let mut data = three_classes();
        data.set_dataset_name("stripes").unwrap();
        data.save(&path).unwrap();

        let loaded = ClassificationData::load(&path).unwrap();
        assert_eq!(loaded, data);
        assert_eq!(loaded.class_counts().get(&2), Some(&10));
    }

    #[test]
    fn test_load_rejects_counter_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counters.txt");
        std::fs::write(
            &path,
            "PIPEKIT_CLASSIFICATION_DATA_V1\nDatasetName: x\nInfoText:\nNumDimensions: 1\n\
             NumSamples: 2\nNumClasses: 1\nClassIDsAndCounters:\n1\t1\nData:\n1\t0.5\n2\t0.7\n",
        )
        .unwrap();
        assert!(matches!(
            ClassificationData::load(&path),
            Err(MlError::Dataset(_))
        ));
    }

    #[test]
    fn test_load_rejects_bad_label() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(
            &path,
            "PIPEKIT_CLASSIFICATION_DATA_V1\nDatasetName: x\nInfoText:\nNumDimensions: 1\n\
             NumSamples: 1\nNumClasses: 1\nClassIDsAndCounters:\n1\t1\nData:\nA\t0.5\n",
        )
        .unwrap();
        assert!(matches!(
            ClassificationData::load(&path),
            Err(MlError::Parse { line: 10, .. })
        ));
    }

    #[test]
    fn test_partition_is_deterministic() {
        let mut a = three_classes();
        let mut b = three_classes();
        let test_a = a.partition(80.0, 11).unwrap();
        let test_b = b.partition(80.0, 11).unwrap();
        assert_eq!(a, b);
        assert_eq!(test_a, test_b);
        assert_eq!(a.num_samples(), 24);
        assert_eq!(test_a.num_samples(), 6);
    }

    #[test]
    fn test_partition_stratified_keeps_proportions() {
        let mut train = three_classes();
        let test = train.partition_stratified(80.0, 5).unwrap();
        for count in train.class_counts().values() {
            assert_eq!(*count, 8);
        }
        for count in test.class_counts().values() {
            assert_eq!(*count, 2);
        }
    }

    #[test]
    fn test_stats_display() {
        let stats = three_classes().stats();
        assert_eq!(stats.class_counts, vec![(1, 10), (2, 10), (3, 10)]);
        assert_eq!(stats.ranges[1], MinMaxRange::new(10.0, 30.0));
        assert!(stats.to_string().contains("ClassLabel: 3\tNumberOfSamples: 10"));
    }
}
