// Indexer module
// Turns a directory of plain-text documents into a freshly published vector collection

#[cfg(test)]
mod tests;

use std::io;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::chunking::{Chunk, DEFAULT_MAX_CHARS, Document, chunk_document};
use crate::config::Config;
use crate::database::{IndexEntry, VectorIndex};
use crate::provider::Embedder;
use crate::{RagError, Result};

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Knobs for a single build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    pub max_chars: usize,
    pub batch_size: usize,
    /// File extensions treated as documents, matched case-sensitively
    pub extensions: Vec<String>,
}

impl Default for BuildSettings {
    #[inline]
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            batch_size: DEFAULT_BATCH_SIZE,
            extensions: vec!["txt".to_string()],
        }
    }
}

impl From<&Config> for BuildSettings {
    #[inline]
    fn from(config: &Config) -> Self {
        Self {
            max_chars: config.index.max_chars,
            batch_size: config.index.batch_size,
            extensions: config.index.extensions.clone(),
        }
    }
}

/// Summary of a completed build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub batches: usize,
    /// Entries live in the published collection
    pub collection: u64,
}

/// Rebuilds the vector index from a corpus directory
pub struct IndexBuilder<'a> {
    embedder: &'a dyn Embedder,
    index: &'a dyn VectorIndex,
    settings: BuildSettings,
}

impl<'a> IndexBuilder<'a> {
    #[inline]
    pub fn new(
        embedder: &'a dyn Embedder,
        index: &'a dyn VectorIndex,
        settings: BuildSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            settings,
        }
    }

    /// Replace the collection with the contents of `corpus_root`.
    ///
    /// Batches are embedded and stored one at a time. The first failure aborts the
    /// build and the previously published collection stays live.
    #[inline]
    pub async fn build(&self, corpus_root: &Path) -> Result<BuildReport> {
        let documents = load_documents(corpus_root, &self.settings.extensions)?;
        info!(
            "Loaded {} documents from {}",
            documents.len(),
            corpus_root.display()
        );

        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| chunk_document(doc, self.settings.max_chars))
            .collect();
        info!("Created {} chunks", chunks.len());

        let mut staging = self.index.begin_rebuild().await?;

        let batch_size = self.settings.batch_size.max(1);
        let bar = progress_bar(chunks.len());
        let mut batches = 0;

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embeddings = self.embedder.embed(&texts)?;

            let entries: Vec<IndexEntry> = batch
                .iter()
                .zip(embeddings.into_vectors())
                .map(|(chunk, vector)| IndexEntry::from_chunk(chunk, vector))
                .collect();
            self.index.add(&mut staging, entries).await?;

            batches += 1;
            bar.inc(batch.len() as u64);
            debug!("Stored batch {} ({} chunks)", batches, batch.len());
        }
        bar.finish_and_clear();

        let collection = self.index.publish(staging).await?;
        info!(
            "Index build complete: {} documents, {} chunks, {} entries live",
            documents.len(),
            chunks.len(),
            collection
        );

        Ok(BuildReport {
            documents: documents.len(),
            chunks: chunks.len(),
            batches,
            collection,
        })
    }
}

fn progress_bar(len: usize) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks") {
        bar.set_style(style);
    }
    bar
}

/// Read every document under `root` whose extension is in `extensions`, sorted by path.
///
/// Symlinked files are included. Unreadable files, dangling links among them, are
/// skipped with a warning. A missing root is an error.
#[inline]
pub fn load_documents(root: &Path, extensions: &[String]) -> Result<Vec<Document>> {
    if !root.is_dir() {
        return Err(RagError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Corpus directory not found: {}", root.display()),
        )));
    }

    let mut documents = Vec::new();
    for path in list_corpus_files(root, extensions) {
        match std::fs::read(&path) {
            Ok(bytes) => documents.push(Document::new(path, decode_lossy(&bytes))),
            Err(e) => warn!("Skipping unreadable file {}: {}", path.display(), e),
        }
    }

    Ok(documents)
}

fn list_corpus_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping corpus entry: {}", e);
                None
            }
        })
        .filter(|entry| {
            // Symlinks are kept unless they point at a directory; reading resolves them
            entry.file_type().is_file() || (entry.path_is_symlink() && !entry.path().is_dir())
        })
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.iter().any(|wanted| wanted == ext))
        })
        .collect();

    files.sort();
    files
}

/// Decode UTF-8, dropping invalid byte sequences instead of replacing them
#[inline]
pub fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}
