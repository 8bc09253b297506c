//! Clustering engine error types.

use grouping_embeddings::EmbeddingError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Embedding provider failed or is not ready
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Item position outside the current store
    #[error("Position {position} out of range for {len} items")]
    PositionOutOfRange { position: usize, len: usize },

    /// Provider returned a vector of the wrong size
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Provider returned NaN or infinite values
    #[error("Embedding contains non-finite values")]
    NonFiniteEmbedding,

    /// Partition does not cover the item set exactly once
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    /// Calibration target does not describe the current items
    #[error("Invalid calibration target: {0}")]
    InvalidTarget(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Blocking worker failed
    #[error("Worker error: {0}")]
    Worker(String),
}

impl CoreError {
    /// True for internal-consistency failures, as opposed to caller or
    /// provider errors.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, CoreError::InvariantViolation(_))
    }
}
