//! Ordered embedding store.
//!
//! Items are identified only by their position. Inserting at a position
//! shifts later items up by one; removing shifts them down.

use grouping_embeddings::Embedding;

use crate::error::CoreError;

/// Ordered sequence of item embeddings with a fixed dimension.
#[derive(Debug, Clone)]
pub struct EmbeddingStore {
    dimension: usize,
    items: Vec<Embedding>,
}

impl EmbeddingStore {
    /// Create an empty store for vectors of `dimension` values.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            items: Vec::new(),
        }
    }

    /// Dimension every stored vector has.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when no items are stored.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Embedding at `position`.
    pub fn get(&self, position: usize) -> Option<&Embedding> {
        self.items.get(position)
    }

    /// All embeddings in position order.
    pub fn as_slice(&self) -> &[Embedding] {
        &self.items
    }

    /// Check that `embedding` may be stored here.
    pub fn check(&self, embedding: &Embedding) -> Result<(), CoreError> {
        if embedding.dimension() != self.dimension {
            return Err(CoreError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.dimension(),
            });
        }
        if !embedding.is_finite() {
            return Err(CoreError::NonFiniteEmbedding);
        }
        Ok(())
    }

    /// Insert at `position` (0..=len).
    pub fn insert(&mut self, position: usize, embedding: Embedding) -> Result<(), CoreError> {
        if position > self.items.len() {
            return Err(CoreError::PositionOutOfRange {
                position,
                len: self.items.len(),
            });
        }
        self.check(&embedding)?;
        self.items.insert(position, embedding);
        Ok(())
    }

    /// Swap the item at `position` (0..len) for `embedding`, returning the
    /// previous one.
    pub fn replace(&mut self, position: usize, embedding: Embedding) -> Result<Embedding, CoreError> {
        self.check(&embedding)?;
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(position)
            .ok_or(CoreError::PositionOutOfRange { position, len })?;
        Ok(std::mem::replace(slot, embedding))
    }

    /// Remove and return the item at `position` (0..len).
    pub fn remove(&mut self, position: usize) -> Result<Embedding, CoreError> {
        if position >= self.items.len() {
            return Err(CoreError::PositionOutOfRange {
                position,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(position))
    }
}
