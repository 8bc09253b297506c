//! # grouping-embeddings
//!
//! Embedding providers for the text grouping engine.
//!
//! The clustering core only sees the [`EmbeddingProvider`] trait: a pure,
//! deterministic `text -> vector` function that returns the zero vector for
//! empty text. This crate ships two implementations:
//! - [`CandleEmbedder`]: local BERT sentence embeddings via Candle, with model
//!   files fetched from HuggingFace Hub and cached on disk
//! - [`HashingEmbedder`]: model-free signed feature hashing, for tests and
//!   offline runs

pub mod cache;
pub mod candle;
pub mod error;
pub mod hashing;
pub mod model;

use std::sync::Arc;

use grouping_types::{EmbeddingSettings, ProviderKind};

pub use crate::candle::CandleEmbedder;
pub use cache::{ModelCache, ModelFile, ModelPaths, DEFAULT_MODEL_REPO};
pub use error::EmbeddingError;
pub use hashing::HashingEmbedder;
pub use model::{Embedding, EmbeddingProvider, ModelInfo};

/// Build the provider selected in the settings.
///
/// Loading failures (missing model files, bad config, dimension mismatch)
/// surface here rather than on the first embed call.
pub fn provider_from_settings(
    settings: &EmbeddingSettings,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match settings.provider {
        ProviderKind::Candle => Ok(Arc::new(CandleEmbedder::from_settings(settings)?)),
        ProviderKind::Hashing => Ok(Arc::new(HashingEmbedder::new(settings.dimension)?)),
    }
}
