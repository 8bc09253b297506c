//! # grouping-types
//!
//! Shared types for the text grouping workspace.
//!
//! This crate defines the data structures that cross crate boundaries:
//! - Settings: layered configuration for the engine, providers and CLI
//! - Partition results: owned cluster definitions returned to callers
//! - Errors: configuration loading and validation failures
//!
//! ## Usage
//!
//! ```rust
//! use grouping_types::{ClusterDefinition, Settings};
//!
//! let settings = Settings::default();
//! assert!(settings.validate().is_ok());
//!
//! let clusters = ClusterDefinition::from_clusters(&[vec![0, 2], vec![1]]);
//! assert_eq!(clusters.cluster_sizes, vec![2, 1]);
//! ```

pub mod config;
pub mod error;
pub mod partition;

pub use crate::config::{
    EmbeddingSettings, EngineConfig, ProviderKind, SessionSettings, Settings, DEFAULT_THRESHOLD,
};
pub use crate::error::GroupingError;
pub use crate::partition::{ClusterDefinition, PartitionResult};
