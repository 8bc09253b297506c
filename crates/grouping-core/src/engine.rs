//! The clustering engine: embedding store, similarity matrix and threshold
//! behind one owning handle.
//!
//! Every structural mutation rebuilds the similarity matrix from scratch and
//! re-extracts the partition. Each call hands back a freshly built, owned
//! [`PartitionResult`]; nothing returned is retained by the engine.
//!
//! ```rust
//! use std::sync::Arc;
//! use grouping_core::ClusteringEngine;
//! use grouping_embeddings::HashingEmbedder;
//! use grouping_types::EngineConfig;
//!
//! let provider = Arc::new(HashingEmbedder::new(64).unwrap());
//! let mut engine = ClusteringEngine::new(EngineConfig::new(0.5, 64), provider).unwrap();
//!
//! engine.insert("mozart piano sonata", 0).unwrap();
//! let result = engine.insert("", 1).unwrap();
//! assert_eq!(result.clusters.indices_len(), 2);
//! ```

use std::sync::Arc;
use std::time::Instant;

use grouping_embeddings::{Embedding, EmbeddingError, EmbeddingProvider};
use grouping_types::{EngineConfig, PartitionResult};
use tracing::{debug, info, instrument, warn};

use crate::calibration::{CalibrationOutcome, ThresholdCalibrator};
use crate::error::CoreError;
use crate::extraction::{ClusterExtractor, Partition};
use crate::similarity::SimilarityMatrix;
use crate::store::EmbeddingStore;

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Incremental threshold clustering over provider embeddings.
///
/// Not internally synchronized: one owner issues one call at a time.
pub struct ClusteringEngine {
    threshold: f32,
    provider: Arc<dyn EmbeddingProvider>,
    store: EmbeddingStore,
    similarities: SimilarityMatrix,
    calibrator: ThresholdCalibrator,
}

impl std::fmt::Debug for ClusteringEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusteringEngine")
            .field("threshold", &self.threshold)
            .field("provider", &self.provider.info().name)
            .field("items", &self.store.len())
            .finish()
    }
}

impl ClusteringEngine {
    /// Create an engine.
    ///
    /// Fails if the threshold is outside (0, 1) or the provider's dimension
    /// differs from the configured one.
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, CoreError> {
        config.validate().map_err(CoreError::InvalidConfig)?;

        let provided = provider.info().dimension;
        if provided != config.dimension {
            return Err(CoreError::InvalidConfig(format!(
                "provider {} produces {} dimensions, engine configured for {}",
                provider.info().name,
                provided,
                config.dimension
            )));
        }

        info!(
            threshold = config.threshold,
            dimension = config.dimension,
            provider = %provider.info().name,
            "Clustering engine created"
        );

        Ok(Self {
            threshold: config.threshold,
            provider,
            store: EmbeddingStore::new(config.dimension),
            similarities: SimilarityMatrix::default(),
            calibrator: ThresholdCalibrator::default(),
        })
    }

    /// Current similarity threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Replace the threshold; must be in (0, 1).
    pub fn set_threshold(&mut self, threshold: f32) -> Result<(), CoreError> {
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(CoreError::InvalidInput(format!(
                "threshold must be in (0, 1), got {}",
                threshold
            )));
        }
        self.threshold = threshold;
        Ok(())
    }

    /// Embedding dimension.
    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True when no items are stored.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Stored embeddings in position order.
    pub fn embeddings(&self) -> &[Embedding] {
        self.store.as_slice()
    }

    /// The similarity matrix over the current items.
    pub fn similarities(&self) -> &SimilarityMatrix {
        &self.similarities
    }

    /// Partition of the current items at the current threshold.
    pub fn partition(&self) -> Result<Partition, CoreError> {
        ClusterExtractor::new(self.threshold).extract_checked(&self.similarities)
    }

    /// Embed `text`, validating the provider's answer.
    fn embed(&self, text: &str) -> Result<Embedding, CoreError> {
        if text.is_empty() {
            return Ok(Embedding::zeros(self.store.dimension()));
        }
        if !self.provider.is_ready() {
            return Err(EmbeddingError::NotReady(self.provider.info().name.clone()).into());
        }
        let embedding = self.provider.embed(text)?;
        self.store.check(&embedding)?;
        Ok(embedding)
    }

    /// Add an item for `text` at `position`, shifting later items up.
    ///
    /// Empty text yields the zero vector and lands in the null group. On any
    /// error the engine is left as it was.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn insert(&mut self, text: &str, position: usize) -> Result<PartitionResult, CoreError> {
        if position > self.store.len() {
            return Err(CoreError::PositionOutOfRange {
                position,
                len: self.store.len(),
            });
        }

        let embed_start = Instant::now();
        let embedding = self.embed(text)?;
        let embedding_ms = elapsed_ms(embed_start);

        let cluster_start = Instant::now();
        self.store.insert(position, embedding)?;
        let matrix = SimilarityMatrix::compute(self.store.as_slice());

        let partition = match ClusterExtractor::new(self.threshold).extract_checked(&matrix) {
            Ok(partition) => partition,
            Err(e) => {
                // Roll back; the old matrix was never replaced.
                self.store.remove(position)?;
                return Err(e);
            }
        };
        self.similarities = matrix;
        let clustering_ms = elapsed_ms(cluster_start);

        debug!(
            items = self.store.len(),
            clusters = partition.len(),
            embedding_ms,
            clustering_ms,
            "Inserted item"
        );

        Ok(PartitionResult {
            clusters: partition.to_definition(),
            embedding_ms,
            clustering_ms,
        })
    }

    /// Remove the item at `position`, shifting later items down.
    ///
    /// With `suppress_recompute` the matrix row and column are dropped but no
    /// clustering runs and an empty placeholder is returned; use it when the
    /// next call is an insert that will recompute anyway.
    #[instrument(skip(self))]
    pub fn remove(
        &mut self,
        position: usize,
        suppress_recompute: bool,
    ) -> Result<PartitionResult, CoreError> {
        if position >= self.store.len() {
            return Err(CoreError::PositionOutOfRange {
                position,
                len: self.store.len(),
            });
        }

        if suppress_recompute {
            self.store.remove(position)?;
            self.similarities.remove(position);
            debug!(items = self.store.len(), "Removed item, clustering deferred");
            return Ok(PartitionResult::empty());
        }

        let cluster_start = Instant::now();
        let removed = self.store.remove(position)?;
        let matrix = SimilarityMatrix::compute(self.store.as_slice());

        let partition = match ClusterExtractor::new(self.threshold).extract_checked(&matrix) {
            Ok(partition) => partition,
            Err(e) => {
                self.store.insert(position, removed)?;
                return Err(e);
            }
        };
        self.similarities = matrix;
        let clustering_ms = elapsed_ms(cluster_start);

        debug!(
            items = self.store.len(),
            clusters = partition.len(),
            clustering_ms,
            "Removed item"
        );

        Ok(PartitionResult {
            clusters: partition.to_definition(),
            embedding_ms: 0.0,
            clustering_ms,
        })
    }

    /// Replace the item at `position` with one for `text`.
    ///
    /// The new embedding is obtained before the store is touched, so a
    /// provider failure leaves the engine as it was.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn replace(&mut self, text: &str, position: usize) -> Result<PartitionResult, CoreError> {
        if position >= self.store.len() {
            return Err(CoreError::PositionOutOfRange {
                position,
                len: self.store.len(),
            });
        }

        let embed_start = Instant::now();
        let embedding = self.embed(text)?;
        let embedding_ms = elapsed_ms(embed_start);

        let cluster_start = Instant::now();
        let previous = self.store.replace(position, embedding)?;
        let matrix = SimilarityMatrix::compute(self.store.as_slice());

        let partition = match ClusterExtractor::new(self.threshold).extract_checked(&matrix) {
            Ok(partition) => partition,
            Err(e) => {
                self.store.replace(position, previous)?;
                return Err(e);
            }
        };
        self.similarities = matrix;
        let clustering_ms = elapsed_ms(cluster_start);

        debug!(
            position,
            clusters = partition.len(),
            embedding_ms,
            clustering_ms,
            "Replaced item"
        );

        Ok(PartitionResult {
            clusters: partition.to_definition(),
            embedding_ms,
            clustering_ms,
        })
    }

    /// Search for the threshold that best reproduces `target_sizes`,
    /// without changing the engine.
    pub fn calibrate_preview(&self, target_sizes: &[usize]) -> Result<CalibrationOutcome, CoreError> {
        self.calibrator.calibrate(&self.similarities, target_sizes)
    }

    /// Adopt the threshold of a calibration outcome.
    ///
    /// Returns false, keeping the current threshold, for the fallback
    /// outcome whose threshold is 0.
    pub fn commit_calibration(&mut self, outcome: &CalibrationOutcome) -> bool {
        if !outcome.found() {
            warn!(
                current = self.threshold,
                "Calibration found no usable threshold, keeping current"
            );
            return false;
        }
        info!(
            previous = self.threshold,
            threshold = outcome.threshold,
            accuracy = outcome.accuracy,
            "Committing calibrated threshold"
        );
        self.threshold = outcome.threshold;
        true
    }

    /// Calibrate against `target_sizes`, commit the winning threshold and
    /// return the partition it produces.
    ///
    /// If no usable threshold is found the current threshold is kept and the
    /// current partition is returned.
    pub fn calibrate(&mut self, target_sizes: &[usize]) -> Result<PartitionResult, CoreError> {
        let start = Instant::now();
        let outcome = self.calibrate_preview(target_sizes)?;
        let partition = if self.commit_calibration(&outcome) {
            outcome.partition
        } else {
            self.partition()?
        };

        Ok(PartitionResult {
            clusters: partition.to_definition(),
            embedding_ms: 0.0,
            clustering_ms: elapsed_ms(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    use grouping_embeddings::ModelInfo;

    /// Provider answering from a fixed text -> vector table.
    struct TableProvider {
        info: ModelInfo,
        table: HashMap<String, Vec<f32>>,
        ready: AtomicBool,
    }

    impl TableProvider {
        fn new(dimension: usize, entries: &[(&str, Vec<f32>)]) -> Self {
            Self {
                info: ModelInfo {
                    name: "table".to_string(),
                    dimension,
                    max_sequence_length: 16,
                },
                table: entries
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
                ready: AtomicBool::new(true),
            }
        }
    }

    impl EmbeddingProvider for TableProvider {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
            self.table
                .get(text)
                .map(|v| Embedding::from_raw(v.clone()))
                .ok_or_else(|| EmbeddingError::InvalidInput(format!("unknown text {}", text)))
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::SeqCst)
        }
    }

    fn provider() -> Arc<TableProvider> {
        Arc::new(TableProvider::new(
            3,
            &[
                ("a", vec![1.0, 0.0, 0.0]),
                ("a2", vec![0.9, 0.1, 0.0]),
                ("b", vec![0.0, 1.0, 0.0]),
                ("b2", vec![0.0, 0.9, 0.1]),
                ("wide", vec![1.0, 0.0]),
                ("nan", vec![f32::NAN, 0.0, 0.0]),
            ],
        ))
    }

    fn engine() -> ClusteringEngine {
        ClusteringEngine::new(EngineConfig::new(0.5, 3), provider()).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_threshold() {
        let err = ClusteringEngine::new(EngineConfig::new(1.0, 3), provider()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_new_rejects_dimension_mismatch() {
        let err = ClusteringEngine::new(EngineConfig::new(0.5, 4), provider()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_insert_groups_similar_items() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        engine.insert("b", 1).unwrap();
        engine.insert("a2", 2).unwrap();
        let result = engine.insert("b2", 3).unwrap();

        assert_eq!(result.clusters.to_clusters(), vec![vec![0, 2], vec![1, 3]]);
        assert_eq!(engine.len(), 4);
        assert_eq!(engine.similarities().len(), 4);
    }

    #[test]
    fn test_insert_in_middle_shifts_indices() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        engine.insert("a2", 1).unwrap();
        let result = engine.insert("b", 1).unwrap();
        assert_eq!(result.clusters.to_clusters(), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_empty_text_goes_to_null_group() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        engine.insert("a2", 1).unwrap();
        let result = engine.insert("", 2).unwrap();

        assert_eq!(result.clusters.to_clusters(), vec![vec![0, 1], vec![2]]);
        assert!(engine.embeddings()[2].is_zero());
        assert_eq!(engine.similarities().get(2, 2), 0.0);
    }

    #[test]
    fn test_insert_out_of_range() {
        let mut engine = engine();
        let err = engine.insert("a", 1).unwrap_err();
        assert!(matches!(err, CoreError::PositionOutOfRange { position: 1, len: 0 }));
    }

    #[test]
    fn test_insert_provider_not_ready_fails_fast() {
        let provider = provider();
        provider.ready.store(false, Ordering::SeqCst);
        let mut engine = ClusteringEngine::new(EngineConfig::new(0.5, 3), provider).unwrap();

        let err = engine.insert("a", 0).unwrap_err();
        assert!(matches!(err, CoreError::Embedding(EmbeddingError::NotReady(_))));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_insert_provider_error_leaves_state() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        assert!(engine.insert("unknown", 1).is_err());
        assert!(matches!(
            engine.insert("wide", 1).unwrap_err(),
            CoreError::DimensionMismatch { expected: 3, actual: 2 }
        ));
        assert!(matches!(
            engine.insert("nan", 1).unwrap_err(),
            CoreError::NonFiniteEmbedding
        ));
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.similarities().len(), 1);
    }

    #[test]
    fn test_remove_recomputes() {
        let mut engine = engine();
        for (i, text) in ["a", "b", "a2"].iter().enumerate() {
            engine.insert(text, i).unwrap();
        }
        let result = engine.remove(1, false).unwrap();
        assert_eq!(result.clusters.to_clusters(), vec![vec![0, 1]]);
        assert_eq!(result.embedding_ms, 0.0);
    }

    #[test]
    fn test_remove_suppressed_returns_placeholder() {
        let mut engine = engine();
        for (i, text) in ["a", "b", "a2"].iter().enumerate() {
            engine.insert(text, i).unwrap();
        }
        let result = engine.remove(0, true).unwrap();
        assert!(result.is_placeholder());
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.similarities().len(), 2);
        assert_eq!(engine.partition().unwrap().clusters(), &[vec![0], vec![1]]);
    }

    #[test]
    fn test_replace_in_place() {
        let mut engine = engine();
        for (i, text) in ["a", "b", "a2"].iter().enumerate() {
            engine.insert(text, i).unwrap();
        }
        engine.remove(1, true).unwrap();
        let result = engine.insert("b2", 1).unwrap();
        assert_eq!(result.clusters.to_clusters(), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_replace_swaps_embedding() {
        let mut engine = engine();
        for (i, text) in ["a", "b", "a2"].iter().enumerate() {
            engine.insert(text, i).unwrap();
        }
        let result = engine.replace("a2", 1).unwrap();
        assert_eq!(result.clusters.to_clusters(), vec![vec![0, 1, 2]]);
        assert_eq!(engine.len(), 3);
    }

    #[test]
    fn test_replace_provider_error_keeps_item() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        engine.insert("b", 1).unwrap();
        let before = engine.embeddings().to_vec();

        assert!(engine.replace("unknown", 1).is_err());
        assert!(matches!(
            engine.replace("nan", 1).unwrap_err(),
            CoreError::NonFiniteEmbedding
        ));
        assert!(matches!(
            engine.replace("a", 2).unwrap_err(),
            CoreError::PositionOutOfRange { position: 2, len: 2 }
        ));
        assert_eq!(engine.embeddings(), before.as_slice());
        assert_eq!(engine.partition().unwrap().clusters(), &[vec![0], vec![1]]);
    }

    #[test]
    fn test_invariant_violation_rolls_back() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        engine.insert("b", 1).unwrap();
        let embeddings = engine.embeddings().to_vec();
        let matrix = engine.similarities().clone();

        // No similarity passes a NaN threshold, so non-null items go unclaimed.
        engine.threshold = f32::NAN;

        assert!(engine.insert("a2", 1).unwrap_err().is_invariant_violation());
        assert!(engine.remove(0, false).unwrap_err().is_invariant_violation());
        assert!(engine.replace("b2", 1).unwrap_err().is_invariant_violation());

        assert_eq!(engine.embeddings(), embeddings.as_slice());
        assert_eq!(engine.similarities(), &matrix);
    }

    #[test]
    fn test_remove_last_item_with_recompute() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        let result = engine.remove(0, false).unwrap();
        assert!(result.is_placeholder());
        assert!(engine.is_empty());
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut engine = engine();
        assert!(matches!(
            engine.remove(0, false).unwrap_err(),
            CoreError::PositionOutOfRange { position: 0, len: 0 }
        ));
    }

    #[test]
    fn test_insert_then_remove_round_trip() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        engine.insert("b", 1).unwrap();
        let before_matrix = engine.similarities().clone();
        let before_embeddings = engine.embeddings().to_vec();
        let before_partition = engine.partition().unwrap();

        engine.insert("a2", 1).unwrap();
        engine.remove(1, false).unwrap();

        assert_eq!(engine.similarities(), &before_matrix);
        assert_eq!(engine.embeddings(), before_embeddings.as_slice());
        assert_eq!(engine.partition().unwrap(), before_partition);
    }

    #[test]
    fn test_set_threshold_validates() {
        let mut engine = engine();
        assert!(engine.set_threshold(0.0).is_err());
        assert!(engine.set_threshold(1.2).is_err());
        engine.set_threshold(0.8).unwrap();
        assert!((engine.threshold() - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_calibrate_commits_threshold() {
        let mut engine = engine();
        for (i, text) in ["a", "a2", "b", "b2"].iter().enumerate() {
            engine.insert(text, i).unwrap();
        }
        let result = engine.calibrate(&[4]).unwrap();
        assert_eq!(result.clusters.cluster_sizes, vec![4]);
        assert!(engine.threshold() < 0.01);

        let result = engine.calibrate(&[2, 2]).unwrap();
        assert_eq!(result.clusters.cluster_sizes, vec![2, 2]);
        let sizes = engine.partition().unwrap().sizes();
        assert_eq!(sizes, vec![2, 2]);
    }

    #[test]
    fn test_calibrate_preview_does_not_mutate() {
        let mut engine = engine();
        for (i, text) in ["a", "a2", "b"].iter().enumerate() {
            engine.insert(text, i).unwrap();
        }
        let outcome = engine.calibrate_preview(&[3]).unwrap();
        assert!(outcome.is_perfect());
        assert!((engine.threshold() - 0.5).abs() < f32::EPSILON);

        assert!(engine.commit_calibration(&outcome));
        assert_eq!(engine.threshold(), outcome.threshold);
    }

    #[test]
    fn test_calibrate_fallback_keeps_threshold() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        let result = engine.calibrate(&[0, 1]).unwrap();
        assert!((engine.threshold() - 0.5).abs() < f32::EPSILON);
        assert_eq!(result.clusters.to_clusters(), vec![vec![0]]);
    }

    #[test]
    fn test_calibrate_rejects_mismatched_target() {
        let mut engine = engine();
        engine.insert("a", 0).unwrap();
        assert!(matches!(
            engine.calibrate(&[2]).unwrap_err(),
            CoreError::InvalidTarget(_)
        ));
    }
}
