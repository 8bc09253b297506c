//! What a provider hands the engine, and the provider contract itself.

use crate::error::EmbeddingError;

/// One item's vector. The all-zero vector marks an item with no text.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// Scale `values` to unit L2 norm. A zero vector is returned unchanged.
    pub fn normalized(values: Vec<f32>) -> Self {
        let norm = values
            .iter()
            .map(|&x| f64::from(x) * f64::from(x))
            .sum::<f64>()
            .sqrt();
        if norm == 0.0 {
            return Self { values };
        }
        Self {
            values: values
                .into_iter()
                .map(|x| (f64::from(x) / norm) as f32)
                .collect(),
        }
    }

    /// Wrap `values` as they are.
    pub fn from_raw(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Embedding of the empty text.
    pub fn zeros(dimension: usize) -> Self {
        Self {
            values: vec![0.0; dimension],
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }

    /// False if any component is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        &self.values
    }
}

/// Identity and shape of a provider's output.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Model or scheme name, e.g. "all-MiniLM-L6-v2"
    pub name: String,
    /// Length of every vector the provider returns
    pub dimension: usize,
    /// Tokens fed to the model per text, special tokens included
    pub max_sequence_length: usize,
}

/// Trait for embedding providers.
///
/// Implementations must be deterministic, return the zero vector for empty
/// text and a finite vector of `info().dimension` values otherwise.
/// They must be thread-safe (Send + Sync) so a session can move across
/// blocking workers.
pub trait EmbeddingProvider: Send + Sync {
    fn info(&self) -> &ModelInfo;

    /// Embed one text.
    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Whether the provider can serve requests right now.
    fn is_ready(&self) -> bool {
        true
    }

    /// Embed several texts, in order. Defaults to one `embed` call each.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}
