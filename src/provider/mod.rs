// Model capabilities consumed by the pipeline: text embedding and answer generation

pub mod openai;

#[cfg(test)]
mod tests;

use crate::{RagError, Result};

pub use openai::OpenAiClient;

/// Turns texts into fixed-length vectors
pub trait Embedder: Send + Sync {
    /// Embed `texts`, returning exactly one vector per input in the same order
    fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch>;
}

/// Produces a natural-language answer for a prompt in a single call
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Vectors returned for one embedding request, checked once at the boundary.
///
/// Holds one vector per requested text, all of the same non-zero dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

impl EmbeddingBatch {
    /// Validate raw vectors against the number of texts that were sent
    #[inline]
    pub fn new(vectors: Vec<Vec<f32>>, expected_count: usize) -> Result<Self> {
        if vectors.len() != expected_count {
            return Err(RagError::Embedding(format!(
                "Mismatch between request and response counts: {} vs {}",
                expected_count,
                vectors.len()
            )));
        }

        let dimension = vectors.first().map_or(0, Vec::len);
        if !vectors.is_empty() && dimension == 0 {
            return Err(RagError::Embedding(
                "Embedding response contained an empty vector".to_string(),
            ));
        }

        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            return Err(RagError::Embedding(format!(
                "Embedding {} has dimension {}, expected {}",
                i,
                v.len(),
                dimension
            )));
        }

        Ok(Self { vectors, dimension })
    }

    #[inline]
    pub fn empty() -> Self {
        Self {
            vectors: Vec::new(),
            dimension: 0,
        }
    }

    /// Dimension shared by every vector, 0 for an empty batch
    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    #[inline]
    pub fn into_vectors(self) -> Vec<Vec<f32>> {
        self.vectors
    }

    /// Take the single vector of a one-text batch
    #[inline]
    pub fn into_single(self) -> Result<Vec<f32>> {
        let count = self.vectors.len();
        let mut vectors = self.vectors.into_iter();
        match (vectors.next(), vectors.next()) {
            (Some(vector), None) => Ok(vector),
            _ => Err(RagError::Embedding(format!(
                "Expected a single embedding, got {}",
                count
            ))),
        }
    }
}
