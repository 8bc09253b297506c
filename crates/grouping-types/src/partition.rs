//! Owned result shapes returned to callers of the engine.
//!
//! Every value here is freshly built per call and owned by the caller; the
//! engine keeps no reference to anything it has returned.

use serde::{Deserialize, Serialize};

/// A partition laid out flat: item indices in partition order plus the size
/// of each cluster in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDefinition {
    /// Item indices, cluster after cluster
    pub indices: Vec<usize>,
    /// Size of each cluster, in partition order
    pub cluster_sizes: Vec<usize>,
}

impl ClusterDefinition {
    /// Flatten an ordered list of clusters.
    pub fn from_clusters(clusters: &[Vec<usize>]) -> Self {
        Self {
            indices: clusters.iter().flatten().copied().collect(),
            cluster_sizes: clusters.iter().map(Vec::len).collect(),
        }
    }

    /// Number of item indices.
    pub fn indices_len(&self) -> usize {
        self.indices.len()
    }

    /// Number of clusters.
    pub fn cluster_sizes_len(&self) -> usize {
        self.cluster_sizes.len()
    }

    /// True when there are no clusters, as for a suppressed remove or a
    /// partition of zero items.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.cluster_sizes.is_empty()
    }

    /// Iterate over the clusters as index slices.
    ///
    /// Stops early if the sizes describe more indices than are present.
    pub fn clusters(&self) -> impl Iterator<Item = &[usize]> + '_ {
        let mut start = 0;
        self.cluster_sizes.iter().map_while(move |&size| {
            let end = start + size;
            let cluster = self.indices.get(start..end)?;
            start = end;
            Some(cluster)
        })
    }

    /// Rebuild the nested cluster list.
    pub fn to_clusters(&self) -> Vec<Vec<usize>> {
        self.clusters().map(<[usize]>::to_vec).collect()
    }
}

/// Partition plus timing diagnostics for one engine call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartitionResult {
    /// The partition, flattened
    pub clusters: ClusterDefinition,
    /// Time spent in the embedding provider, in milliseconds
    pub embedding_ms: f64,
    /// Time spent computing similarities and clusters, in milliseconds
    pub clustering_ms: f64,
}

impl PartitionResult {
    /// Placeholder result for calls that skipped clustering.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when the result carries no clusters.
    ///
    /// Holds for the placeholder of a suppressed remove and also for a
    /// recompute that leaves no items.
    pub fn is_placeholder(&self) -> bool {
        self.clusters.is_empty()
    }
}
