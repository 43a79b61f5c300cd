// Retrieval module
// Nearest-neighbour lookup of chunk texts for a natural-language question


use tracing::debug;

use crate::Result;
use crate::database::{ScoredEntry, VectorIndex};
use crate::provider::Embedder;

/// Hits for one query, closest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    hits: Vec<ScoredEntry>,
}

impl RetrievalResult {
    /// Build from store hits, ordering them by distance.
    ///
    /// The sort is stable, so equal distances keep the store's order.
    #[inline]
    pub fn new(mut hits: Vec<ScoredEntry>) -> Self {
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Self { hits }
    }

    #[inline]
    pub fn hits(&self) -> &[ScoredEntry] {
        &self.hits
    }

    /// Chunk texts in ranking order
    #[inline]
    pub fn texts(&self) -> Vec<String> {
        self.hits.iter().map(|hit| hit.text.clone()).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

pub struct Retriever<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
}

impl<'a> Retriever<'a> {
    #[inline]
    pub fn new(embedder: &'a dyn Embedder, index: &'a dyn VectorIndex) -> Self {
        Self { embedder, index }
    }

    /// Find up to `k` chunks closest to `query`.
    ///
    /// An empty or unbuilt index yields an empty result rather than an error.
    #[inline]
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Ok(RetrievalResult::default());
        }

        let vector = self.embedder.embed(&[query.to_string()])?.into_single()?;
        let hits = self.index.query(&vector, k).await?;

        debug!("Retrieved {} of {} requested chunks", hits.len(), k);
        Ok(RetrievalResult::new(hits))
    }
}
