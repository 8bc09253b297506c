//! Greedy threshold cluster extraction.
//!
//! Every item proposes its neighbourhood (all items at least `threshold`
//! similar to it, itself included). Zero-vector items are pooled into one
//! null group instead. Neighbourhoods are taken largest first and each one
//! keeps only the items no earlier neighbourhood has claimed, so the result
//! is a partition with no overlap.

use grouping_types::ClusterDefinition;
use tracing::debug;

use crate::error::CoreError;
use crate::similarity::SimilarityMatrix;

/// Ordered list of disjoint clusters covering items `0..n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    clusters: Vec<Vec<usize>>,
}

impl Partition {
    /// Wrap an ordered list of clusters without checking it.
    pub fn from_clusters(clusters: Vec<Vec<usize>>) -> Self {
        Self { clusters }
    }

    /// The clusters, largest first.
    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters
    }

    /// Number of clusters.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    /// True when there are no clusters.
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total number of items across clusters.
    pub fn item_count(&self) -> usize {
        self.clusters.iter().map(Vec::len).sum()
    }

    /// Cluster sizes in partition order.
    pub fn sizes(&self) -> Vec<usize> {
        self.clusters.iter().map(Vec::len).collect()
    }

    /// Index of the cluster holding `item`.
    pub fn cluster_of(&self, item: usize) -> Option<usize> {
        self.clusters.iter().position(|c| c.contains(&item))
    }

    /// Flat representation handed to callers.
    pub fn to_definition(&self) -> ClusterDefinition {
        ClusterDefinition::from_clusters(&self.clusters)
    }

    /// Check that every index in `0..n` appears exactly once.
    pub fn validate_cover(&self, n: usize) -> Result<(), CoreError> {
        let mut seen = vec![false; n];
        for cluster in &self.clusters {
            if cluster.is_empty() {
                return Err(CoreError::InvariantViolation(
                    "partition contains an empty cluster".to_string(),
                ));
            }
            for &item in cluster {
                match seen.get_mut(item) {
                    None => {
                        return Err(CoreError::InvariantViolation(format!(
                            "item {} outside 0..{}",
                            item, n
                        )))
                    }
                    Some(true) => {
                        return Err(CoreError::InvariantViolation(format!(
                            "item {} assigned to more than one cluster",
                            item
                        )))
                    }
                    Some(slot) => *slot = true,
                }
            }
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(CoreError::InvariantViolation(format!(
                "item {} not assigned to any cluster ({} of {} covered)",
                missing,
                self.item_count(),
                n
            )));
        }
        Ok(())
    }
}

/// Extracts a partition from a similarity matrix at a fixed threshold.
#[derive(Debug, Clone, Copy)]
pub struct ClusterExtractor {
    threshold: f32,
}

impl ClusterExtractor {
    /// Create an extractor for `threshold`.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// The threshold this extractor applies.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Candidate neighbourhoods in enumeration order, null group last.
    fn candidates(&self, matrix: &SimilarityMatrix) -> Vec<Vec<usize>> {
        let n = matrix.len();
        let mut candidates = Vec::with_capacity(n + 1);
        let mut null_group = Vec::new();

        for i in 0..n {
            if matrix.is_null(i) {
                null_group.push(i);
                continue;
            }
            let neighbourhood: Vec<usize> = matrix
                .row(i)
                .iter()
                .enumerate()
                .filter(|&(_, &sim)| sim >= self.threshold)
                .map(|(j, _)| j)
                .collect();
            candidates.push(neighbourhood);
        }

        if !null_group.is_empty() {
            candidates.push(null_group);
        }
        candidates
    }

    /// Partition the items of `matrix`.
    ///
    /// Deterministic: the same matrix and threshold always give the same
    /// clusters in the same order. Does not check coverage; see
    /// [`ClusterExtractor::extract_checked`].
    pub fn extract(&self, matrix: &SimilarityMatrix) -> Partition {
        let mut candidates = self.candidates(matrix);

        // Stable: equal sizes keep enumeration order.
        candidates.sort_by(|a, b| b.len().cmp(&a.len()));

        let mut claimed = vec![false; matrix.len()];
        let mut clusters = Vec::new();

        // Members are already ascending: rows are scanned left to right.
        for candidate in candidates {
            let cluster: Vec<usize> = candidate.into_iter().filter(|&j| !claimed[j]).collect();
            if cluster.is_empty() {
                continue;
            }
            for &j in &cluster {
                claimed[j] = true;
            }
            clusters.push(cluster);
        }

        debug!(
            items = matrix.len(),
            clusters = clusters.len(),
            threshold = self.threshold,
            "Extracted clusters"
        );

        Partition { clusters }
    }

    /// Partition the items of `matrix` and verify the result covers every
    /// item exactly once.
    pub fn extract_checked(&self, matrix: &SimilarityMatrix) -> Result<Partition, CoreError> {
        let partition = self.extract(matrix);
        partition.validate_cover(matrix.len())?;
        Ok(partition)
    }
}
