// LanceDB vector database module
// Handles vector storage, similarity search and collection rebuilds


pub mod vector_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::chunking::Chunk;

pub use vector_store::VectorStore;

/// A chunk together with its embedding, as persisted in the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// `source:ordinal`, unique within a build
    pub id: String,
    pub vector: Vec<f32>,
    /// The chunk text, stored verbatim
    pub text: String,
    /// Path of the document the chunk came from
    pub source: String,
    pub ordinal: u32,
}

/// A nearest-neighbour hit returned by a query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub id: String,
    pub text: String,
    pub source: String,
    pub ordinal: u32,
    /// Distance to the query vector under the store's metric, lower is closer
    pub distance: f32,
}

/// An entry read back from the index without its vector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub id: String,
    pub text: String,
    pub source: String,
    pub ordinal: u32,
}

/// A collection being populated by a rebuild; invisible to queries until published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingCollection {
    /// Physical table name, `<collection>__<uuid>`
    pub name: String,
    pub(crate) dimension: Option<usize>,
    pub(crate) rows: u64,
}

impl StagingCollection {
    #[inline]
    pub fn new(name: String) -> Self {
        Self {
            name,
            dimension: None,
            rows: 0,
        }
    }

    /// Vector dimension fixed by the first added batch
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Rows appended so far
    #[inline]
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

impl IndexEntry {
    #[inline]
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            vector,
            text: chunk.text.clone(),
            source: chunk.source_path.clone(),
            ordinal: u32::try_from(chunk.ordinal).unwrap_or(u32::MAX),
        }
    }
}

/// Persistent nearest-neighbour index.
///
/// Rebuilds write into a staging collection and become visible atomically on
/// [`publish`](VectorIndex::publish); readers keep seeing the previous collection
/// until then.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Start a full rebuild into a fresh, empty staging collection
    async fn begin_rebuild(&self) -> Result<StagingCollection>;

    /// Append entries to a staging collection
    async fn add(&self, staging: &mut StagingCollection, entries: Vec<IndexEntry>) -> Result<()>;

    /// Make the staging collection the live one, returning its row count
    async fn publish(&self, staging: StagingCollection) -> Result<u64>;

    /// Up to `k` live entries nearest to `vector`, ascending by distance
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    /// Number of entries in the live collection
    async fn count(&self) -> Result<u64>;

    /// All live entries ordered by source and ordinal
    async fn entries(&self) -> Result<Vec<StoredEntry>>;
}
