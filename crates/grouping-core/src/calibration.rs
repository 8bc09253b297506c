//! Brute-force threshold calibration.
//!
//! Given a target grouping expressed only as a sequence of group sizes, scan
//! thresholds `0.0001, 0.0002, ..., 0.9999` and keep the one whose partition
//! agrees best with the target. Agreement is positional: both size sequences
//! are expanded so that position `p` holds the ordinal of the group it would
//! fall in if groups were laid out contiguously, e.g. `[3, 2, 1]` expands to
//! `[0, 0, 0, 1, 1, 2]`. Actual item indices never enter the comparison.
//!
//! The search runs over an immutable matrix and never touches engine state;
//! the caller decides whether to commit the winning threshold.

use tracing::{debug, info, instrument};

use crate::error::CoreError;
use crate::extraction::{ClusterExtractor, Partition};
use crate::similarity::SimilarityMatrix;

/// Distance between consecutive trial thresholds.
pub const CALIBRATION_STEP: f64 = 0.0001;

/// Number of trials; the last trial threshold is just below 1.0.
pub const CALIBRATION_TRIALS: u32 = 9999;

/// Result of a calibration search.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationOutcome {
    /// Winning threshold, or 0.0 if no trial scored above zero
    pub threshold: f32,
    /// Partition produced at the winning threshold
    pub partition: Partition,
    /// Fraction of positions agreeing with the target, in [0, 1]
    pub accuracy: f32,
    /// Number of thresholds tried before stopping
    pub trials: u32,
}

impl CalibrationOutcome {
    /// True when the winning partition reproduces the target sizes exactly.
    pub fn is_perfect(&self) -> bool {
        self.accuracy >= 1.0
    }

    /// False for the fallback outcome, whose threshold is not usable.
    pub fn found(&self) -> bool {
        self.threshold > 0.0
    }
}

/// Expand group sizes into per-position group ordinals.
pub fn expand_sizes(sizes: &[usize]) -> Vec<usize> {
    sizes
        .iter()
        .enumerate()
        .flat_map(|(ordinal, &size)| std::iter::repeat(ordinal).take(size))
        .collect()
}

/// Positional agreement between two size sequences describing the same
/// number of items.
///
/// Returns 0.0 when either sequence describes no items.
pub fn size_accuracy(candidate_sizes: &[usize], target_sizes: &[usize]) -> f32 {
    let candidate = expand_sizes(candidate_sizes);
    let target = expand_sizes(target_sizes);
    let n = candidate.len().max(target.len());
    if n == 0 {
        return 0.0;
    }
    let matches = candidate
        .iter()
        .zip(&target)
        .filter(|(c, t)| c == t)
        .count();
    matches as f32 / n as f32
}

/// Scans thresholds for the best agreement with a target size sequence.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdCalibrator {
    step: f64,
    trials: u32,
}

impl Default for ThresholdCalibrator {
    fn default() -> Self {
        Self {
            step: CALIBRATION_STEP,
            trials: CALIBRATION_TRIALS,
        }
    }
}

impl ThresholdCalibrator {
    /// Create a calibrator with the default scan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Threshold tried at trial `k` (1-based).
    fn threshold_at(&self, k: u32) -> f32 {
        (k as f64 * self.step) as f32
    }

    /// Run the search.
    ///
    /// Stops at the first threshold reproducing the target exactly. Among
    /// equally good non-perfect thresholds the lowest one wins.
    #[instrument(skip(self, matrix), fields(items = matrix.len()))]
    pub fn calibrate(
        &self,
        matrix: &SimilarityMatrix,
        target_sizes: &[usize],
    ) -> Result<CalibrationOutcome, CoreError> {
        let n = matrix.len();
        if n == 0 {
            return Err(CoreError::InvalidTarget(
                "cannot calibrate without items".to_string(),
            ));
        }
        let target_total = target_sizes
            .iter()
            .try_fold(0usize, |total, &size| total.checked_add(size))
            .ok_or_else(|| {
                CoreError::InvalidTarget("target sizes overflow the item count".to_string())
            })?;
        if target_total != n {
            return Err(CoreError::InvalidTarget(format!(
                "target describes {} items but {} are present",
                target_total, n
            )));
        }

        let target = expand_sizes(target_sizes);
        let mut best: Option<(f32, Partition, f32)> = None;
        let mut best_accuracy = 0.0f32;
        let mut trials = 0;

        for k in 1..=self.trials {
            trials = k;
            let threshold = self.threshold_at(k);
            let partition = ClusterExtractor::new(threshold).extract_checked(matrix)?;

            let candidate = expand_sizes(&partition.sizes());
            let mismatches = candidate
                .iter()
                .zip(&target)
                .filter(|(c, t)| c != t)
                .count();
            let accuracy = (n - mismatches) as f32 / n as f32;

            if mismatches == 0 {
                debug!(threshold, trials = k, "Perfect match");
                best = Some((threshold, partition, 1.0));
                break;
            }
            if accuracy > best_accuracy {
                best_accuracy = accuracy;
                best = Some((threshold, partition, accuracy));
            }
        }

        let outcome = match best {
            Some((threshold, partition, accuracy)) => CalibrationOutcome {
                threshold,
                partition,
                accuracy,
                trials,
            },
            None => CalibrationOutcome {
                threshold: 0.0,
                partition: Partition::default(),
                accuracy: 0.0,
                trials,
            },
        };

        info!(
            threshold = outcome.threshold,
            accuracy = outcome.accuracy,
            trials = outcome.trials,
            "Calibration complete"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_pairs() -> SimilarityMatrix {
        SimilarityMatrix::from_rows(vec![
            vec![1.0, 0.9, 0.1, 0.15],
            vec![0.9, 1.0, 0.05, 0.1],
            vec![0.1, 0.05, 1.0, 0.95],
            vec![0.15, 0.1, 0.95, 1.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_expand_sizes() {
        assert_eq!(expand_sizes(&[3, 2, 1]), vec![0, 0, 0, 1, 1, 2]);
        assert_eq!(expand_sizes(&[0, 2]), vec![1, 1]);
        assert!(expand_sizes(&[]).is_empty());
    }

    #[test]
    fn test_size_accuracy() {
        assert_eq!(size_accuracy(&[2, 2], &[2, 2]), 1.0);
        // [0,0,1,1] vs [0,0,0,1]
        assert_eq!(size_accuracy(&[2, 2], &[3, 1]), 0.75);
        assert_eq!(size_accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_calibrate_finds_pairs() {
        let outcome = ThresholdCalibrator::new()
            .calibrate(&two_pairs(), &[2, 2])
            .unwrap();
        assert!(outcome.is_perfect());
        assert_eq!(outcome.partition.sizes(), vec![2, 2]);
        // Lowest threshold separating the pairs sits just above 0.15.
        assert!(outcome.threshold > 0.15 && outcome.threshold <= 0.1501 + 1e-6);

        let replay = ClusterExtractor::new(outcome.threshold).extract(&two_pairs());
        assert_eq!(replay.sizes(), vec![2, 2]);
    }

    #[test]
    fn test_calibrate_finds_single_cluster() {
        let outcome = ThresholdCalibrator::new()
            .calibrate(&two_pairs(), &[4])
            .unwrap();
        assert!(outcome.is_perfect());
        assert!((outcome.threshold - 0.0001).abs() < 1e-7);
        assert_eq!(outcome.trials, 1);
    }

    #[test]
    fn test_calibrate_singletons() {
        let outcome = ThresholdCalibrator::new()
            .calibrate(&two_pairs(), &[1, 1, 1, 1])
            .unwrap();
        assert!(outcome.is_perfect());
        assert!(outcome.threshold > 0.95);
    }

    #[test]
    fn test_calibrate_unreachable_target_keeps_best() {
        // Partitions are ordered largest first, so [1, 3] is never produced.
        let outcome = ThresholdCalibrator::new()
            .calibrate(&two_pairs(), &[1, 3])
            .unwrap();
        assert!(!outcome.is_perfect());
        assert!(outcome.found());
        assert_eq!(outcome.trials, CALIBRATION_TRIALS);
        // [2, 2] expands to [0, 0, 1, 1] against [0, 1, 1, 1]
        assert_eq!(outcome.accuracy, 0.75);
        assert_eq!(outcome.partition.sizes(), vec![2, 2]);
        assert!(outcome.threshold > 0.15 && outcome.threshold < 0.1502);
    }

    #[test]
    fn test_calibrate_ignores_membership() {
        // Only sizes matter: a target naming different members but the same
        // sizes is indistinguishable.
        let matrix = SimilarityMatrix::from_rows(vec![
            vec![1.0, 0.1, 0.9],
            vec![0.1, 1.0, 0.1],
            vec![0.9, 0.1, 1.0],
        ])
        .unwrap();
        // Intended grouping {0, 1} {2} has sizes [2, 1], which {0, 2} {1} also has.
        let outcome = ThresholdCalibrator::new().calibrate(&matrix, &[2, 1]).unwrap();
        assert!(outcome.is_perfect());
        assert_eq!(outcome.partition.clusters(), &[vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_calibrate_leading_empty_group_falls_back() {
        // [0, 1] expands to [1]; every partition of one item expands to [0].
        let matrix = SimilarityMatrix::from_rows(vec![vec![1.0]]).unwrap();
        let outcome = ThresholdCalibrator::new().calibrate(&matrix, &[0, 1]).unwrap();
        assert!(!outcome.found());
        assert_eq!(outcome.threshold, 0.0);
        assert_eq!(outcome.accuracy, 0.0);
        assert!(outcome.partition.is_empty());
    }

    #[test]
    fn test_calibrate_rejects_wrong_total() {
        let err = ThresholdCalibrator::new()
            .calibrate(&two_pairs(), &[2, 1])
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTarget(_)));
    }

    #[test]
    fn test_calibrate_rejects_overflowing_sizes() {
        // Wraps to 4 without the overflow check.
        let err = ThresholdCalibrator::new()
            .calibrate(&two_pairs(), &[usize::MAX, 5])
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTarget(_)));
    }

    #[test]
    fn test_calibrate_rejects_empty_matrix() {
        let err = ThresholdCalibrator::new()
            .calibrate(&SimilarityMatrix::default(), &[])
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTarget(_)));
    }
}
