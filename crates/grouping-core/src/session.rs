//! Grouping session: keeps item identities aligned with engine positions.
//!
//! The engine only knows positions. The session maps each position to the
//! `(id, tab_id)` key of the item stored there and turns index partitions
//! back into groups of keys.

use std::sync::Arc;

use grouping_embeddings::EmbeddingProvider;
use grouping_types::{ClusterDefinition, EngineConfig, PartitionResult, Settings};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::engine::ClusteringEngine;
use crate::error::CoreError;
use crate::textual::{ItemKey, TextualItem};

/// Groups of item keys after one session call, with the engine's timings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupingUpdate {
    pub groups: Vec<Vec<ItemKey>>,
    pub result: PartitionResult,
}

/// Outcome of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Threshold in force after calibration
    pub threshold: f32,
    /// Threshold before calibration
    pub previous_threshold: f32,
    /// Positional size agreement of the winning partition, in [0, 1]
    pub accuracy: f32,
    /// False when no trial scored and the previous threshold was kept
    pub committed: bool,
    pub groups: Vec<Vec<ItemKey>>,
}

/// Session over one clustering engine.
#[derive(Debug)]
pub struct GroupingSession {
    engine: ClusteringEngine,
    keys: Vec<ItemKey>,
    title_only_hosts: Vec<String>,
}

impl GroupingSession {
    /// Create a session with an explicit host list.
    pub fn new(
        config: EngineConfig,
        provider: Arc<dyn EmbeddingProvider>,
        title_only_hosts: Vec<String>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            engine: ClusteringEngine::new(config, provider)?,
            keys: Vec::new(),
            title_only_hosts,
        })
    }

    /// Create a session from loaded settings.
    pub fn from_settings(
        settings: &Settings,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, CoreError> {
        Self::new(
            settings.engine_config(),
            provider,
            settings.session.title_only_hosts.clone(),
        )
    }

    /// Current similarity threshold.
    pub fn threshold(&self) -> f32 {
        self.engine.threshold()
    }

    /// Number of items in the session.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Item keys in engine position order.
    pub fn keys(&self) -> &[ItemKey] {
        &self.keys
    }

    pub fn engine(&self) -> &ClusteringEngine {
        &self.engine
    }

    fn position_of(&self, key: &ItemKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    fn groups_of(&self, clusters: &ClusterDefinition) -> Vec<Vec<ItemKey>> {
        clusters
            .clusters()
            .map(|cluster| {
                cluster
                    .iter()
                    .filter_map(|&i| self.keys.get(i).cloned())
                    .collect()
            })
            .collect()
    }

    /// Add an item, or replace it in place if its key is already present.
    #[instrument(skip(self, item), fields(id = %item.id, tab_id = %item.tab_id))]
    pub fn add(&mut self, item: &TextualItem) -> Result<GroupingUpdate, CoreError> {
        let key = item.key();
        let text = item.embedding_text(&self.title_only_hosts);

        let result = match self.position_of(&key) {
            Some(position) => {
                debug!(position, "Replacing existing item");
                self.engine.replace(&text, position)?
            }
            None => {
                let result = self.engine.insert(&text, self.keys.len())?;
                self.keys.push(key);
                result
            }
        };

        Ok(GroupingUpdate {
            groups: self.groups_of(&result.clusters),
            result,
        })
    }

    /// Remove the item with the given key. Unknown keys are ignored.
    #[instrument(skip(self))]
    pub fn remove(&mut self, id: &str, tab_id: &str) -> Result<GroupingUpdate, CoreError> {
        let key = ItemKey::new(id, tab_id);
        let Some(position) = self.position_of(&key) else {
            debug!("Unknown item, nothing removed");
            return Ok(GroupingUpdate::default());
        };

        let result = self.engine.remove(position, false)?;
        self.keys.remove(position);

        Ok(GroupingUpdate {
            groups: self.groups_of(&result.clusters),
            result,
        })
    }

    /// Current groups, recomputed at the current threshold.
    pub fn groups(&self) -> Result<Vec<Vec<ItemKey>>, CoreError> {
        let partition = self.engine.partition()?;
        Ok(self.groups_of(&partition.to_definition()))
    }

    /// Tune the threshold so the partition's group sizes match `expected`.
    ///
    /// Only the sizes of the expected groups are used; which items they
    /// name does not affect the search. Keys unknown to the session are
    /// counted all the same.
    #[instrument(skip(self, expected), fields(groups = expected.len()))]
    pub fn calibrate(&mut self, expected: &[Vec<ItemKey>]) -> Result<CalibrationReport, CoreError> {
        let unknown = expected
            .iter()
            .flatten()
            .filter(|k| self.position_of(k).is_none())
            .count();
        if unknown > 0 {
            warn!(unknown, "Expected groups name items not in the session");
        }

        let sizes: Vec<usize> = expected.iter().map(Vec::len).collect();
        let previous_threshold = self.engine.threshold();

        let outcome = self.engine.calibrate_preview(&sizes)?;
        let committed = self.engine.commit_calibration(&outcome);
        let groups = if committed {
            self.groups_of(&outcome.partition.to_definition())
        } else {
            self.groups()?
        };

        info!(
            previous_threshold,
            threshold = self.engine.threshold(),
            accuracy = outcome.accuracy,
            committed,
            "Session calibrated"
        );

        Ok(CalibrationReport {
            threshold: self.engine.threshold(),
            previous_threshold,
            accuracy: outcome.accuracy,
            committed,
            groups,
        })
    }
}
