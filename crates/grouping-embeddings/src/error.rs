//! Embedding provider errors.

use thiserror::Error;

/// Failures while loading a provider or embedding text.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Tensor operation or model forward pass failed
    #[error("Model inference failed: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Tokenization failed: {0}")]
    Tokenizer(String),

    /// Model files are present but unusable
    #[error("Invalid model files: {0}")]
    InvalidModel(String),

    #[error("Could not fetch model from {repo}: {reason}")]
    Download { repo: String, reason: String },

    #[error("Model cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Provider cannot serve requests yet
    #[error("Embedding provider {0} is not ready")]
    NotReady(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model output size differs from the configured dimension
    #[error("Model produces {actual} dimensions, {expected} configured")]
    DimensionMismatch { expected: usize, actual: usize },
}
