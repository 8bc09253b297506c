use grouping_core::{ClusterExtractor, SimilarityMatrix, ThresholdCalibrator};
use proptest::prelude::*;

/// Vectors in 4 dimensions; roughly one in six is the zero vector.
fn vectors(max: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(
        prop_oneof![
            5 => prop::collection::vec(-1.0f32..1.0, 4),
            1 => Just(vec![0.0f32; 4]),
        ],
        1..max,
    )
}

/// Strictly positive vectors: every pair has positive similarity.
fn positive_vectors(max: usize) -> impl Strategy<Value = Vec<Vec<f32>>> {
    prop::collection::vec(prop::collection::vec(0.1f32..1.0, 4), 1..max)
}

fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|&x| x == 0.0)
}

proptest! {
    #[test]
    fn prop_partition_covers_every_item_once(
        data in vectors(20),
        threshold in 0.0001f32..0.9999
    ) {
        let matrix = SimilarityMatrix::compute(&data);
        let partition = ClusterExtractor::new(threshold).extract_checked(&matrix).unwrap();

        prop_assert_eq!(partition.item_count(), data.len());
        prop_assert!(partition.clusters().iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn prop_matrix_symmetric_with_unit_diagonal(data in vectors(20)) {
        let matrix = SimilarityMatrix::compute(&data);
        prop_assert!(matrix.is_symmetric());
        for (i, v) in data.iter().enumerate() {
            let expected = if is_zero(v) { 0.0 } else { 1.0 };
            prop_assert_eq!(matrix.get(i, i), expected);
        }
    }

    #[test]
    fn prop_extraction_deterministic(data in vectors(20), threshold in 0.0001f32..0.9999) {
        let matrix = SimilarityMatrix::compute(&data);
        let extractor = ClusterExtractor::new(threshold);
        prop_assert_eq!(extractor.extract(&matrix), extractor.extract(&matrix));
    }

    #[test]
    fn prop_zero_items_share_one_group(data in vectors(20), threshold in 0.0001f32..0.9999) {
        let matrix = SimilarityMatrix::compute(&data);
        let partition = ClusterExtractor::new(threshold).extract(&matrix);
        let zeros: Vec<usize> = (0..data.len()).filter(|&i| is_zero(&data[i])).collect();

        if !zeros.is_empty() {
            let group = partition.cluster_of(zeros[0]).unwrap();
            prop_assert_eq!(&partition.clusters()[group], &zeros);
        }
    }

    #[test]
    fn prop_threshold_above_all_pairs_gives_singletons(data in vectors(12)) {
        let matrix = SimilarityMatrix::compute(&data);
        let n = data.len();
        let max_off = (0..n)
            .flat_map(|i| (0..n).filter(move |&j| j != i).map(move |j| (i, j)))
            .map(|(i, j)| matrix.get(i, j))
            .fold(f32::MIN, f32::max);
        prop_assume!(max_off < 0.999);

        let threshold = ((max_off + 1.0) / 2.0).max(0.0001);
        let partition = ClusterExtractor::new(threshold).extract(&matrix);
        for cluster in partition.clusters() {
            if cluster.len() > 1 {
                prop_assert!(cluster.iter().all(|&i| is_zero(&data[i])));
            }
        }
    }

    #[test]
    fn prop_low_threshold_merges_positive_items(data in positive_vectors(12)) {
        let matrix = SimilarityMatrix::compute(&data);
        let partition = ClusterExtractor::new(0.0001).extract(&matrix);
        prop_assert_eq!(partition.len(), 1);
        prop_assert_eq!(partition.item_count(), data.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_calibration_recovers_reachable_sizes(
        data in vectors(8),
        k in 1u32..9999
    ) {
        let matrix = SimilarityMatrix::compute(&data);
        let threshold = (k as f64 * 0.0001) as f32;
        let target = ClusterExtractor::new(threshold).extract(&matrix).sizes();

        let outcome = ThresholdCalibrator::new().calibrate(&matrix, &target).unwrap();
        prop_assert_eq!(outcome.accuracy, 1.0);
        prop_assert!(outcome.threshold <= threshold);
        prop_assert_eq!(outcome.partition.sizes(), target.clone());

        let replay = ClusterExtractor::new(outcome.threshold).extract(&matrix);
        prop_assert_eq!(replay.sizes(), target);
    }
}
