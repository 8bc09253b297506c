//! # grouping-core
//!
//! Incremental threshold clustering of text items.
//!
//! Items live in an ordered store addressed by position. After every insert
//! or remove the full pairwise cosine similarity matrix is rebuilt and a
//! greedy extractor turns it into a partition: each item proposes every item
//! at least `threshold` similar to it, proposals are taken largest first and
//! keep only unclaimed items. Items whose embedding is the zero vector (empty
//! text) are pooled into one trailing null group.
//!
//! The threshold can be tuned from a reference grouping: the calibrator scans
//! `0.0001..=0.9999` and keeps the threshold whose cluster sizes best match.
//!
//! Layers, bottom up:
//! - [`similarity`]: cosine similarity and the [`SimilarityMatrix`]
//! - [`store`]: ordered embedding store
//! - [`extraction`]: [`ClusterExtractor`] and [`Partition`]
//! - [`calibration`]: [`ThresholdCalibrator`]
//! - [`engine`]: [`ClusteringEngine`], the owning handle
//! - [`textual`] and [`session`]: item identities and embedding text
//! - [`service`]: async, serialized access for hosts

pub mod calibration;
pub mod engine;
pub mod error;
pub mod extraction;
pub mod service;
pub mod session;
pub mod similarity;
pub mod store;
pub mod textual;

pub use calibration::{
    expand_sizes, size_accuracy, CalibrationOutcome, ThresholdCalibrator, CALIBRATION_STEP,
    CALIBRATION_TRIALS,
};
pub use engine::ClusteringEngine;
pub use error::CoreError;
pub use extraction::{ClusterExtractor, Partition};
pub use service::GroupingService;
pub use session::{CalibrationReport, GroupingSession, GroupingUpdate};
pub use similarity::{cosine_similarity, normalize, SimilarityMatrix};
pub use store::EmbeddingStore;
pub use textual::{process_title, url_host, ItemKey, TextualItem, TextualItemKind};
