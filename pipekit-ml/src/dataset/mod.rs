//! Labelled datasets and their text file format.
//!
//! Two dataset kinds share one layout: a header of `Key: value` lines, a
//! `Data:` marker, then one whitespace-separated row per sample.
//!
//! - [`RegressionData`] rows are `inputs… targets…`
//! - [`ClassificationData`] rows are `label inputs…`
//!
//! Values are written with Rust's shortest round-trip float formatting, so
//! `load(save(d))` reproduces every sample exactly.

pub mod classification;
pub mod regression;

pub use classification::{ClassificationData, ClassificationSample, ClassificationStats};
pub use regression::{RegressionData, RegressionSample, RegressionStats};

use crate::error::{MlError, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::Path;
use std::str::FromStr;

/// Marks the start of the sample rows in a dataset file.
pub(crate) const DATA_MARKER: &str = "Data:";

/// Borrowed view of either dataset kind, so the pipeline can take both
/// through one `train`/`test` entry point.
#[derive(Debug, Clone, Copy)]
pub enum DatasetRef<'a> {
    Regression(&'a RegressionData),
    Classification(&'a ClassificationData),
}

impl DatasetRef<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Regression(_) => "regression",
            Self::Classification(_) => "classification",
        }
    }

    pub fn num_samples(&self) -> usize {
        match self {
            Self::Regression(d) => d.num_samples(),
            Self::Classification(d) => d.num_samples(),
        }
    }
}

impl<'a> From<&'a RegressionData> for DatasetRef<'a> {
    fn from(data: &'a RegressionData) -> Self {
        Self::Regression(data)
    }
}

impl<'a> From<&'a ClassificationData> for DatasetRef<'a> {
    fn from(data: &'a ClassificationData) -> Self {
        Self::Classification(data)
    }
}

/// Line-oriented reader for the dataset header and rows, tracking line
/// numbers for error messages.
pub(crate) struct TextReader<'a> {
    path: &'a Path,
    lines: std::iter::Peekable<std::iter::Enumerate<std::str::Lines<'a>>>,
    last_line: usize,
}

impl<'a> TextReader<'a> {
    pub(crate) fn new(path: &'a Path, content: &'a str) -> Self {
        Self {
            path,
            lines: content.lines().enumerate().peekable(),
            last_line: 0,
        }
    }

    pub(crate) fn error(&self, line: usize, message: impl Into<String>) -> MlError {
        MlError::Parse {
            path: self.path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    /// Next line, trimmed, with its 1-based number. Errors at end of file.
    pub(crate) fn next_line(&mut self, expecting: &str) -> Result<(usize, &'a str)> {
        match self.lines.next() {
            Some((idx, line)) => {
                self.last_line = idx + 1;
                Ok((idx + 1, line.trim()))
            }
            None => Err(self.error(
                self.last_line + 1,
                format!("unexpected end of file, expected {expecting}"),
            )),
        }
    }

    /// Consume a line that must equal `expected` exactly.
    pub(crate) fn expect_line(&mut self, expected: &str) -> Result<()> {
        let (line_no, line) = self.next_line(expected)?;
        if line != expected {
            return Err(self.error(line_no, format!("expected '{expected}', found '{line}'")));
        }
        Ok(())
    }

    /// Consume a `Key: value` line and return the (possibly empty) value.
    pub(crate) fn header_value(&mut self, key: &str) -> Result<&'a str> {
        let (line_no, line) = self.next_line(key)?;
        match line.strip_prefix(key).and_then(|rest| rest.strip_prefix(':')) {
            Some(value) => Ok(value.trim()),
            None => Err(self.error(line_no, format!("expected '{key}:' header, found '{line}'"))),
        }
    }

    /// Consume a `Key: value` line and parse the value.
    pub(crate) fn header_parse<T: FromStr>(&mut self, key: &str) -> Result<T> {
        let value = self.header_value(key)?;
        value
            .parse()
            .map_err(|_| self.error(self.last_line, format!("invalid value '{value}' for {key}")))
    }

    /// Remaining non-blank lines with their line numbers.
    pub(crate) fn rows(self) -> impl Iterator<Item = (usize, &'a str)> {
        self.lines
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty())
    }
}

/// Parse whitespace-separated floats.
pub(crate) fn parse_fields(line: &str) -> std::result::Result<Vec<f64>, String> {
    line.split_whitespace()
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|_| format!("'{field}' is not a number"))
        })
        .collect()
}

/// Append `values` to `out`, tab separated.
pub(crate) fn push_fields(out: &mut String, values: &[f64]) {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push('\t');
        }
        out.push_str(&v.to_string());
    }
}

pub(crate) fn check_finite(values: &[f64], what: &str) -> Result<()> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(idx) => Err(MlError::dataset(format!(
            "{what} contains a non-finite value at index {idx}"
        ))),
        None => Ok(()),
    }
}

pub(crate) fn check_percent(percent: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&percent) {
        return Err(MlError::invalid_input(format!(
            "partition percentage must be within [0, 100], got {percent}"
        )));
    }
    Ok(())
}

/// Pick `floor(n * percent / 100)` of `n` indices with a seeded shuffle.
/// Returns a mask, `true` for kept indices.
pub(crate) fn keep_mask(n: usize, percent: f64, rng: &mut StdRng) -> Vec<bool> {
    let keep = ((n as f64) * percent / 100.0).floor() as usize;
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let mut mask = vec![false; n];
    for &idx in order.iter().take(keep.min(n)) {
        mask[idx] = true;
    }
    mask
}

pub(crate) fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Split `items` by `mask`, preserving relative order on both sides.
pub(crate) fn split_by_mask<T>(items: Vec<T>, mask: &[bool]) -> (Vec<T>, Vec<T>) {
    let kept_count = mask.iter().filter(|&&k| k).count();
    let mut kept = Vec::with_capacity(kept_count);
    let mut rest = Vec::with_capacity(items.len().saturating_sub(kept_count));
    for (item, &keep) in items.into_iter().zip(mask) {
        if keep {
            kept.push(item);
        } else {
            rest.push(item);
        }
    }
    (kept, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fields() {
        assert_eq!(parse_fields("1\t-2.5  3e2").unwrap(), vec![1.0, -2.5, 300.0]);
        assert!(parse_fields("1 two 3").is_err());
        assert!(parse_fields("").unwrap().is_empty());
    }

    #[test]
    fn test_push_fields_round_trip() {
        let values = [0.1, 1.0 / 3.0, -7.0, 1e-300];
        let mut line = String::new();
        push_fields(&mut line, &values);
        assert_eq!(parse_fields(&line).unwrap(), values);
    }

    #[test]
    fn test_keep_mask_counts() {
        let mut rng = seeded_rng(1);
        let mask = keep_mask(10, 80.0, &mut rng);
        assert_eq!(mask.iter().filter(|&&k| k).count(), 8);

        let mask = keep_mask(7, 50.0, &mut rng);
        assert_eq!(mask.iter().filter(|&&k| k).count(), 3);

        assert!(keep_mask(5, 0.0, &mut rng).iter().all(|&k| !k));
        assert!(keep_mask(5, 100.0, &mut rng).iter().all(|&k| k));
    }

    #[test]
    fn test_keep_mask_deterministic_for_seed() {
        let a = keep_mask(50, 30.0, &mut seeded_rng(9));
        let b = keep_mask(50, 30.0, &mut seeded_rng(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_split_by_mask_preserves_order() {
        let (kept, rest) = split_by_mask(vec![1, 2, 3, 4, 5], &[true, false, true, false, false]);
        assert_eq!(kept, vec![1, 3]);
        assert_eq!(rest, vec![2, 4, 5]);
    }

    #[test]
    fn test_check_percent() {
        assert!(check_percent(0.0).is_ok());
        assert!(check_percent(100.0).is_ok());
        assert!(check_percent(-0.1).is_err());
        assert!(check_percent(100.5).is_err());
        assert!(check_percent(f64::NAN).is_err());
    }

    #[test]
    fn test_header_reader() {
        let content = "MAGIC\nName: demo\nCount: 3\nData:\n\n1 2\n";
        let path = Path::new("mem.txt");
        let mut reader = TextReader::new(path, content);
        reader.expect_line("MAGIC").unwrap();
        assert_eq!(reader.header_value("Name").unwrap(), "demo");
        assert_eq!(reader.header_parse::<usize>("Count").unwrap(), 3);
        reader.expect_line(DATA_MARKER).unwrap();
        let rows: Vec<_> = reader.rows().collect();
        assert_eq!(rows, vec![(6, "1 2")]);
    }

    #[test]
    fn test_header_reader_reports_line() {
        let content = "MAGIC\nWrong: 1\n";
        let mut reader = TextReader::new(Path::new("mem.txt"), content);
        reader.expect_line("MAGIC").unwrap();
        match reader.header_value("Count") {
            Err(MlError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
