//! Property-based tests for datasets and metrics using proptest.

use proptest::prelude::*;

use pipekit_ml::metrics::{ClassificationAccumulator, RegressionAccumulator};
use pipekit_ml::{ClassificationData, RegressionData};

fn regression_rows(dims: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(-1e6f64..1e6, dims), 0..60)
}

fn sort_key(values: &[f64]) -> Vec<u64> {
    values.iter().map(|v| v.to_bits()).collect()
}

// --- Partition properties ---

proptest! {
    #[test]
    fn partition_sizes_and_multiset(
        rows in regression_rows(3),
        percent in 0.0f64..=100.0,
        seed in any::<u64>(),
    ) {
        let mut data = RegressionData::new(2, 1);
        for row in &rows {
            data.add_sample(row[..2].to_vec(), row[2..].to_vec()).unwrap();
        }
        let original = data.clone();
        let n = rows.len();

        let rest = data.partition(percent, seed).unwrap();
        let expected_kept = ((n as f64) * percent / 100.0).floor() as usize;
        prop_assert_eq!(data.num_samples(), expected_kept);
        prop_assert_eq!(data.num_samples() + rest.num_samples(), n);

        let mut before: Vec<Vec<u64>> = original
            .samples()
            .iter()
            .map(|s| sort_key(&[s.input_vector(), s.target_vector()].concat()))
            .collect();
        let mut after: Vec<Vec<u64>> = data
            .samples()
            .iter()
            .chain(rest.samples())
            .map(|s| sort_key(&[s.input_vector(), s.target_vector()].concat()))
            .collect();
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn partition_is_deterministic(
        rows in regression_rows(2),
        percent in 0.0f64..=100.0,
        seed in any::<u64>(),
    ) {
        let mut a = RegressionData::new(1, 1);
        for row in &rows {
            a.add_sample(vec![row[0]], vec![row[1]]).unwrap();
        }
        let mut b = a.clone();
        let rest_a = a.partition(percent, seed).unwrap();
        let rest_b = b.partition(percent, seed).unwrap();
        prop_assert_eq!(a, b);
        prop_assert_eq!(rest_a, rest_b);
    }

    #[test]
    fn partition_rejects_out_of_range(percent in 100.0001f64..1e6, seed in any::<u64>()) {
        let mut data = ClassificationData::new(1);
        data.add_sample(1, vec![0.0]).unwrap();
        let before = data.clone();
        prop_assert!(data.partition(percent, seed).is_err());
        prop_assert!(data.partition(-percent, seed).is_err());
        prop_assert_eq!(data, before);
    }
}

// --- Dataset file properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn classification_file_round_trip(
        samples in prop::collection::vec(
            (1u32..6, prop::collection::vec(any::<f64>().prop_filter("finite", |v| v.is_finite()), 4)),
            1..40,
        ),
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.txt");
        let mut data = ClassificationData::new(4);
        for (label, sample) in samples {
            data.add_sample(label, sample).unwrap();
        }
        data.save(&path).unwrap();
        prop_assert_eq!(ClassificationData::load(&path).unwrap(), data);
    }
}

// --- Metric properties ---

proptest! {
    #[test]
    fn rms_is_zero_for_perfect_predictions(rows in regression_rows(4)) {
        prop_assume!(!rows.is_empty());
        let mut acc = RegressionAccumulator::new(4);
        for row in &rows {
            acc.add(row, row).unwrap();
        }
        let metrics = acc.finish().unwrap();
        prop_assert_eq!(metrics.rms_error, 0.0);
        prop_assert_eq!(metrics.sse, 0.0);
    }

    #[test]
    fn rms_matches_definition(
        pairs in prop::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 1..50),
    ) {
        let mut acc = RegressionAccumulator::new(1);
        for (p, t) in &pairs {
            acc.add(&[*p], &[*t]).unwrap();
        }
        let metrics = acc.finish().unwrap();
        let sse: f64 = pairs.iter().map(|(p, t)| (p - t).powi(2)).sum();
        let expected = (sse / pairs.len() as f64).sqrt();
        prop_assert!((metrics.rms_error - expected).abs() <= 1e-9 * expected.max(1.0));
        prop_assert!(metrics.rms_error >= 0.0);
    }

    #[test]
    fn accuracy_is_fraction_correct(
        pairs in prop::collection::vec((1u32..4, 0u32..4), 1..100),
    ) {
        let mut acc = ClassificationAccumulator::new(vec![1, 2, 3]);
        for &(t, p) in &pairs {
            acc.add(t, p);
        }
        let metrics = acc.finish().unwrap();
        let correct = pairs.iter().filter(|(t, p)| t == p).count();
        prop_assert_eq!(metrics.num_correct, correct);
        prop_assert!((metrics.accuracy - correct as f64 / pairs.len() as f64).abs() < 1e-12);
        prop_assert!((0.0..=1.0).contains(&metrics.accuracy));

        let counted: usize = metrics.confusion_matrix.iter().flatten().sum();
        prop_assert_eq!(counted, pairs.len());
    }
}
