
use std::path::{Path, PathBuf};

use tracing::debug;

/// Separator placed between paragraphs, both when splitting and when joining
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Default character cap for a single chunk
pub const DEFAULT_MAX_CHARS: usize = 800;

const SEPARATOR_LEN: usize = PARAGRAPH_SEPARATOR.len();

/// A source file read from the corpus, alive only for the duration of a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub raw_text: String,
}

/// A bounded span of document text ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `source_path:ordinal`
    pub id: String,
    pub text: String,
    pub source_path: String,
    /// Position of this chunk within its document, starting at 0
    pub ordinal: usize,
}

impl Document {
    #[inline]
    pub fn new(path: impl Into<PathBuf>, raw_text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            raw_text: raw_text.into(),
        }
    }

    /// The path as it appears in chunk ids and stored metadata
    #[inline]
    pub fn source(&self) -> String {
        source_label(&self.path)
    }
}

impl Chunk {
    #[inline]
    pub fn new(source_path: &str, ordinal: usize, text: String) -> Self {
        Self {
            id: chunk_id(source_path, ordinal),
            text,
            source_path: source_path.to_string(),
            ordinal,
        }
    }
}

#[inline]
pub fn chunk_id(source_path: &str, ordinal: usize) -> String {
    format!("{}:{}", source_path, ordinal)
}

#[inline]
pub fn source_label(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Split text into chunks of at most `max_chars` characters on paragraph boundaries.
///
/// Paragraphs are never split. A paragraph longer than `max_chars` becomes a chunk
/// of its own and is left oversized.
#[inline]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for paragraph in text
        .split(PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        let paragraph_len = paragraph.chars().count();

        if current_len + paragraph_len + SEPARATOR_LEN <= max_chars {
            if !current.is_empty() {
                current.push_str(PARAGRAPH_SEPARATOR);
                current_len += SEPARATOR_LEN;
            }
            current.push_str(paragraph);
            current_len += paragraph_len;
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current.push_str(paragraph);
            current_len = paragraph_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Chunk a whole document, assigning ids and ordinals
#[inline]
pub fn chunk_document(document: &Document, max_chars: usize) -> Vec<Chunk> {
    let source = document.source();
    let chunks: Vec<Chunk> = chunk_text(&document.raw_text, max_chars)
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| Chunk::new(&source, ordinal, text))
        .collect();

    debug!(
        "Chunked '{}' into {} chunks (avg {} chars)",
        source,
        chunks.len(),
        chunks.iter().map(|c| c.text.chars().count()).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}
