//! Hash embeddings.
//!
//! Signed FNV-1a feature hashing over lower-cased word tokens. No model
//! files, fully deterministic; similar token sets give similar vectors.

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider, ModelInfo};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hash embedder using FNV-1a
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    info: ModelInfo,
}

impl HashingEmbedder {
    /// Create embedder with specified dimension
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InvalidInput(
                "hashing dimension must be > 0".to_string(),
            ));
        }
        Ok(Self {
            info: ModelInfo {
                name: "fnv1a-hashing".to_string(),
                dimension,
                max_sequence_length: usize::MAX,
            },
        })
    }

    fn add_feature(&self, values: &mut [f32], token: &str) {
        let hash = fnv1a(token.as_bytes());
        let bucket = (hash % values.len() as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        values[bucket] += sign;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(FNV_PRIME)
    })
}

impl EmbeddingProvider for HashingEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let dim = self.info.dimension;
        if text.is_empty() {
            return Ok(Embedding::zeros(dim));
        }

        let lowered = text.to_lowercase();
        let mut values = vec![0.0f32; dim];
        let mut seen = 0usize;

        // Single characters are mostly markup noise such as the "</s>" separator.
        for token in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() > 1)
        {
            self.add_feature(&mut values, token);
            seen += 1;
        }

        if seen == 0 {
            let trimmed = lowered.trim();
            if trimmed.is_empty() {
                return Ok(Embedding::zeros(dim));
            }
            self.add_feature(&mut values, trimmed);
        }

        Ok(Embedding::normalized(values))
    }
}
