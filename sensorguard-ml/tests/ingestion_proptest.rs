//! Property-based tests for the train/test split.

use proptest::prelude::*;

use sensorguard_ml::DataFrame;
use sensorguard_ml::components::ingestion::{SplitSettings, split_indices, test_size};

fn frame(labels: &[bool]) -> DataFrame {
    let rows = labels
        .iter()
        .enumerate()
        .map(|(i, pos)| vec![if *pos { "pos" } else { "neg" }.to_string(), i.to_string()])
        .collect();
    DataFrame::new(vec!["class".into(), "aa_000".into()], rows).unwrap()
}

fn settings(ratio: f64, seed: u64, stratify: bool) -> SplitSettings {
    SplitSettings {
        test_ratio: ratio,
        seed,
        stratify,
        target_column: "class".into(),
    }
}

proptest! {
    #[test]
    fn split_conserves_every_row(
        labels in prop::collection::vec(any::<bool>(), 2..200),
        ratio in 0.01f64..0.99,
        seed in any::<u64>(),
        stratify in any::<bool>(),
    ) {
        let data = frame(&labels);
        let (train, test) = split_indices(&data, &settings(ratio, seed, stratify)).unwrap();
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        prop_assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());
    }

    #[test]
    fn unstratified_split_honors_ratio(
        n in 2usize..500,
        ratio in 0.01f64..0.99,
        seed in any::<u64>(),
    ) {
        let data = frame(&vec![false; n]);
        let (train, test) = split_indices(&data, &settings(ratio, seed, false)).unwrap();
        prop_assert_eq!(test.len(), test_size(n, ratio));
        prop_assert!(!train.is_empty());
        prop_assert!(!test.is_empty());
        let exact = n as f64 * ratio;
        prop_assert!((test.len() as f64 - exact).abs() <= 1.0 || test.len() == 1 || train.len() == 1);
    }

    #[test]
    fn split_is_deterministic_for_a_seed(
        labels in prop::collection::vec(any::<bool>(), 2..100),
        ratio in 0.05f64..0.95,
        seed in any::<u64>(),
    ) {
        let data = frame(&labels);
        let first = split_indices(&data, &settings(ratio, seed, true)).unwrap();
        let second = split_indices(&data, &settings(ratio, seed, true)).unwrap();
        prop_assert_eq!(first, second);
    }
}
