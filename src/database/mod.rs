// Database module
// Persistent nearest-neighbour index backed by LanceDB

pub mod lancedb;

pub use self::lancedb::{
    IndexEntry, ScoredEntry, StagingCollection, StoredEntry, VectorIndex, VectorStore,
};
