//! Candle-based embedding implementation.
//!
//! Runs a BERT sentence-transformer (all-MiniLM-L6-v2 by default, 384
//! dimensions) on CPU with mean pooling over the attention mask.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use grouping_types::EmbeddingSettings;

use crate::cache::ModelCache;
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider, ModelInfo};

/// Embedding dimension for all-MiniLM-L6-v2
pub const EMBEDDING_DIM: usize = 384;

/// Default maximum sequence length, special tokens included
pub const MAX_SEQ_LENGTH: usize = 128;

/// The part of the model config we check before loading weights.
#[derive(Debug, Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

/// Candle-based BERT sentence embedder.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load the embedding model from cache (downloading if needed).
    pub fn load(cache: &ModelCache, max_seq_length: usize) -> Result<Self, EmbeddingError> {
        let paths = cache.ensure()?;
        Self::load_from_paths(
            &paths.config,
            &paths.tokenizer,
            &paths.weights,
            max_seq_length,
        )
    }

    /// Load with default cache settings
    pub fn load_default() -> Result<Self, EmbeddingError> {
        Self::load(&ModelCache::default(), MAX_SEQ_LENGTH)
    }

    /// Load the model described by the embedding settings.
    ///
    /// Fails if the model's hidden size differs from the configured dimension.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self, EmbeddingError> {
        let cache = ModelCache::new(settings.expanded_cache_dir(), &settings.model_repo);
        let embedder = Self::load(&cache, settings.max_seq_length)?;
        if embedder.info.dimension != settings.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: settings.dimension,
                actual: embedder.info.dimension,
            });
        }
        Ok(embedder)
    }

    /// Load from explicit file paths
    pub fn load_from_paths(
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
        max_seq_length: usize,
    ) -> Result<Self, EmbeddingError> {
        if max_seq_length < 2 {
            return Err(EmbeddingError::InvalidInput(format!(
                "max_seq_length must leave room for special tokens, got {}",
                max_seq_length
            )));
        }

        info!("Loading embedding model...");

        let device = Device::Cpu;

        let config_str = std::fs::read_to_string(config_path)?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::InvalidModel(format!("config.json: {}", e)))?;
        let hidden: HiddenSize = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::InvalidModel(format!("config.json: {}", e)))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        // SAFETY: the weights file is owned by the model cache and is not
        // modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };

        let model = BertModel::load(vb, &config)?;

        let name = config_path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "bert".to_string());

        info!(
            model = %name,
            dim = hidden.hidden_size,
            max_seq = max_seq_length,
            "Model loaded successfully"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            info: ModelInfo {
                name,
                dimension: hidden.hidden_size,
                max_sequence_length: max_seq_length,
            },
        })
    }

    /// Mean pooling over token embeddings (excluding padding)
    fn mean_pooling(
        &self,
        embeddings: &Tensor,
        attention_mask: &Tensor,
    ) -> Result<Tensor, EmbeddingError> {
        let mask = attention_mask
            .unsqueeze(2)?
            .broadcast_as(embeddings.shape())?;
        let mask_f32 = mask.to_dtype(DType::F32)?;

        let masked = embeddings.broadcast_mul(&mask_f32)?;
        let sum = masked.sum(1)?;

        let mask_sum = mask_f32.sum(1)?;
        let mask_sum = mask_sum.clamp(1e-9, f64::MAX)?;

        let mean = sum.broadcast_div(&mask_sum)?;
        Ok(mean)
    }

    /// Embed non-empty texts in one forward pass.
    fn embed_non_empty(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let max_seq = self.info.max_sequence_length;

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0)
            .min(max_seq);

        let mut input_ids: Vec<u32> = Vec::with_capacity(texts.len() * max_len);
        let mut attention_masks: Vec<u32> = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let (ids, mask) = truncate_keeping_last(
                encoding.get_ids(),
                encoding.get_attention_mask(),
                max_len,
            );
            input_ids.extend(ids.iter().copied());
            input_ids.extend(std::iter::repeat(0).take(max_len - ids.len()));
            attention_masks.extend(mask.iter().copied());
            attention_masks.extend(std::iter::repeat(0).take(max_len - mask.len()));
        }

        let batch_size = texts.len();
        let input_ids = Tensor::from_vec(input_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(attention_masks, (batch_size, max_len), &self.device)?;
        let token_type_ids = Tensor::zeros_like(&input_ids)?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let pooled = self.mean_pooling(&output, &attention_mask)?;
        let pooled_vec: Vec<Vec<f32>> = pooled.to_vec2()?;

        Ok(pooled_vec.into_iter().map(Embedding::normalized).collect())
    }
}

/// Truncate a token sequence to `max_len`, keeping the trailing special token.
fn truncate_keeping_last(ids: &[u32], mask: &[u32], max_len: usize) -> (Vec<u32>, Vec<u32>) {
    if ids.len() <= max_len || max_len == 0 {
        return (ids.to_vec(), mask.to_vec());
    }
    let mut ids_out = ids[..max_len - 1].to_vec();
    let mut mask_out = mask[..max_len - 1].to_vec();
    if let (Some(&last_id), Some(&last_mask)) = (ids.last(), mask.last()) {
        ids_out.push(last_id);
        mask_out.push(last_mask);
    }
    (ids_out, mask_out)
}

impl EmbeddingProvider for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidInput("empty batch result".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        debug!(count = texts.len(), "Embedding batch");

        let non_empty: Vec<&str> = texts.iter().copied().filter(|t| !t.is_empty()).collect();
        let mut computed = if non_empty.is_empty() {
            Vec::new()
        } else {
            self.embed_non_empty(&non_empty)?
        }
        .into_iter();

        let dim = self.info.dimension;
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            if text.is_empty() {
                embeddings.push(Embedding::zeros(dim));
            } else {
                let embedding = computed.next().ok_or_else(|| {
                    EmbeddingError::InvalidInput("model returned too few embeddings".to_string())
                })?;
                embeddings.push(embedding);
            }
        }

        debug!(count = embeddings.len(), dim, "Batch complete");

        Ok(embeddings)
    }
}
