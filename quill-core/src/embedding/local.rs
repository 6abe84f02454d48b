//! Deterministic offline embedding provider.

use super::{EmbeddingError, EmbeddingService, Result};
use async_trait::async_trait;

const DEFAULT_LOCAL_DIMENSION: usize = 768;

/// Pseudo-embedding provider that needs no model and no network.
///
/// The text is folded into a 32-bit hash, which seeds a linear-congruential
/// generator producing `dimension` values in `[-1, 1)`. The vector is then
/// L2-normalized. The output carries no semantics beyond identity: equal
/// strings map to bit-identical vectors, different strings to unrelated ones.
#[derive(Debug, Clone)]
pub struct LocalEmbeddingService {
    dimension: usize,
}

impl LocalEmbeddingService {
    /// Creates a provider; a zero dimension falls back to 768.
    pub fn new(dimension: usize) -> Self {
        let dimension = if dimension == 0 {
            DEFAULT_LOCAL_DIMENSION
        } else {
            dimension
        };
        Self { dimension }
    }

    /// Parses `local-<dim>` model names, e.g. `local-384`.
    pub fn dimension_from_model(model: &str) -> usize {
        model
            .strip_prefix("local-")
            .and_then(|dim| dim.parse::<usize>().ok())
            .filter(|dim| *dim > 0)
            .unwrap_or(DEFAULT_LOCAL_DIMENSION)
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut state = text
            .chars()
            .fold(0u32, |hash, c| hash.wrapping_mul(31).wrapping_add(c as u32));

        let mut embedding: Vec<f32> = (0..self.dimension)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                ((state >> 16) & 0x7fff) as f32 / 16_384.0 - 1.0
            })
            .collect();

        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        embedding
    }
}

impl Default for LocalEmbeddingService {
    fn default() -> Self {
        Self::new(DEFAULT_LOCAL_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingService for LocalEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        Ok(self.generate(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyBatch);
        }

        let mut embeddings = Vec::with_capacity(texts.len());
        for (index, text) in texts.iter().enumerate() {
            let embedding = self
                .embed(text)
                .await
                .map_err(|e| EmbeddingError::BatchItem {
                    index,
                    source: Box::new(e),
                })?;
            embeddings.push(embedding);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
