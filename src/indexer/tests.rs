use super::*;
use crate::database::VectorStore;
use crate::provider::EmbeddingBatch;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const DIM: usize = 4;

/// Deterministic embedder deriving a vector from the text's bytes
struct FakeEmbedder {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
}

impl FakeEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
        }
    }

    fn failing_on(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: Some(call),
        }
    }
}

fn fake_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIM];
    for (i, byte) in text.bytes().enumerate() {
        vector[i % DIM] += f32::from(byte) / 255.0;
    }
    vector
}

impl Embedder for FakeEmbedder {
    fn embed(&self, texts: &[String]) -> Result<EmbeddingBatch> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(RagError::Network("HTTP 500 from embeddings".to_string()));
        }
        EmbeddingBatch::new(texts.iter().map(|t| fake_vector(t)).collect(), texts.len())
    }
}

fn write_corpus(files: &[(&str, &[u8])]) -> TempDir {
    let dir = TempDir::new().expect("should create corpus dir");
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("should create parent dir");
        }
        std::fs::write(path, content).expect("should write corpus file");
    }
    dir
}

async fn open_store(dir: &TempDir) -> VectorStore {
    VectorStore::open(&dir.path().join("lancedb"), "nfl_knowledge", DIM)
        .await
        .expect("should open vector store")
}

fn small_settings() -> BuildSettings {
    BuildSettings {
        max_chars: 40,
        batch_size: 2,
        ..BuildSettings::default()
    }
}

#[test]
fn default_settings() {
    let settings = BuildSettings::default();

    assert_eq!(settings.max_chars, 800);
    assert_eq!(settings.batch_size, 32);
    assert_eq!(settings.extensions, vec!["txt".to_string()]);
}

#[test]
fn settings_from_config() {
    let mut config = Config::default();
    config.index.batch_size = 7;
    config.index.max_chars = 120;
    config.index.extensions = vec!["md".to_string()];

    let settings = BuildSettings::from(&config);

    assert_eq!(settings.batch_size, 7);
    assert_eq!(settings.max_chars, 120);
    assert_eq!(settings.extensions, vec!["md".to_string()]);
}

#[test]
fn decode_drops_invalid_bytes() {
    assert_eq!(decode_lossy(b"Hail \xff\xfeMary"), "Hail Mary");
    assert_eq!(decode_lossy("Touchdown \u{FFFD}".as_bytes()), "Touchdown \u{FFFD}");
    assert_eq!(decode_lossy(b""), "");
}

#[test]
fn load_documents_filters_and_sorts() {
    let corpus = write_corpus(&[
        ("rules/b.txt", b"Second."),
        ("a.txt", b"First."),
        ("notes.md", b"Ignored."),
        ("upper.TXT", b"Ignored, extension is case-sensitive."),
    ]);

    let documents =
        load_documents(corpus.path(), &["txt".to_string()]).expect("should load documents");

    let paths: Vec<PathBuf> = documents.iter().map(|d| d.path.clone()).collect();
    assert_eq!(
        paths,
        vec![corpus.path().join("a.txt"), corpus.path().join("rules/b.txt")]
    );
    assert_eq!(documents[0].raw_text, "First.");
}

#[test]
fn load_documents_missing_root_is_error() {
    let dir = TempDir::new().expect("should create temp dir");

    let result = load_documents(&dir.path().join("missing"), &["txt".to_string()]);

    assert!(matches!(result, Err(RagError::Io(_))));
}

#[tokio::test]
async fn build_indexes_every_chunk() {
    let corpus = write_corpus(&[
        (
            "rules.txt",
            b"A safety scores two points.\n\nA touchdown scores six points.\n\nA field goal scores three points.",
        ),
        ("analytics.txt", b"EPA is expected points added."),
    ]);
    let db_dir = TempDir::new().expect("should create db dir");
    let store = open_store(&db_dir).await;
    let embedder = FakeEmbedder::new();

    let report = IndexBuilder::new(&embedder, &store, small_settings())
        .build(corpus.path())
        .await
        .expect("build should succeed");

    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 4);
    assert_eq!(report.batches, 2);
    assert_eq!(report.collection, 4);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);

    let entries = store.entries().await.expect("should list entries");
    let ids: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), entries.len(), "ids should be unique");

    let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
    assert!(texts.contains(&"A touchdown scores six points."));
    assert!(texts.contains(&"EPA is expected points added."));

    let rules_source = corpus.path().join("rules.txt").display().to_string();
    assert!(
        entries
            .iter()
            .any(|e| e.source == rules_source && e.id == format!("{}:0", rules_source))
    );
}

#[tokio::test]
async fn rebuild_is_idempotent() {
    let corpus = write_corpus(&[
        ("rules.txt", b"Holding is a ten yard penalty.\n\nFalse start is five yards."),
    ]);
    let db_dir = TempDir::new().expect("should create db dir");
    let store = open_store(&db_dir).await;
    let embedder = FakeEmbedder::new();
    let builder = IndexBuilder::new(&embedder, &store, small_settings());

    builder
        .build(corpus.path())
        .await
        .expect("first build should succeed");
    let first = store.entries().await.expect("should list entries");

    builder
        .build(corpus.path())
        .await
        .expect("second build should succeed");
    let second = store.entries().await.expect("should list entries");

    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_corpus_publishes_empty_collection() {
    let corpus = write_corpus(&[("ignored.md", b"Not a text file.")]);
    let db_dir = TempDir::new().expect("should create db dir");
    let store = open_store(&db_dir).await;
    let embedder = FakeEmbedder::new();

    let report = IndexBuilder::new(&embedder, &store, BuildSettings::default())
        .build(corpus.path())
        .await
        .expect("build should succeed");

    assert_eq!(report.documents, 0);
    assert_eq!(report.chunks, 0);
    assert_eq!(report.batches, 0);
    assert_eq!(report.collection, 0);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.count().await.expect("should count"), 0);
}

#[tokio::test]
async fn failed_build_keeps_previous_collection() {
    let old_corpus = write_corpus(&[("old.txt", b"Old rule.")]);
    let new_corpus = write_corpus(&[(
        "new.txt",
        b"New rule one.\n\nNew rule two.\n\nNew rule three.\n\nNew rule four.\n\nNew rule five.",
    )]);
    let db_dir = TempDir::new().expect("should create db dir");
    let store = open_store(&db_dir).await;

    IndexBuilder::new(&FakeEmbedder::new(), &store, small_settings())
        .build(old_corpus.path())
        .await
        .expect("initial build should succeed");

    let failing = FakeEmbedder::failing_on(2);
    let settings = BuildSettings {
        max_chars: 16,
        batch_size: 2,
        ..BuildSettings::default()
    };
    let result = IndexBuilder::new(&failing, &store, settings)
        .build(new_corpus.path())
        .await;

    assert!(matches!(result, Err(RagError::Network(_))));
    let entries = store.entries().await.expect("should list entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "Old rule.");
}

#[tokio::test]
async fn invalid_utf8_is_dropped_during_build() {
    let corpus = write_corpus(&[("rules.txt", b"Pass \xc3interference.")]);
    let db_dir = TempDir::new().expect("should create db dir");
    let store = open_store(&db_dir).await;

    IndexBuilder::new(&FakeEmbedder::new(), &store, BuildSettings::default())
        .build(corpus.path())
        .await
        .expect("build should succeed");

    let entries = store.entries().await.expect("should list entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text, "Pass interference.");
}

#[cfg(unix)]
#[test]
fn symlinked_files_are_loaded() {
    let corpus = write_corpus(&[("shared/rules.txt", b"Linked rule.")]);
    std::os::unix::fs::symlink(
        corpus.path().join("shared/rules.txt"),
        corpus.path().join("link.txt"),
    )
    .expect("should create symlink");
    std::os::unix::fs::symlink(corpus.path().join("shared"), corpus.path().join("dir.txt"))
        .expect("should create directory symlink");

    let documents =
        load_documents(corpus.path(), &["txt".to_string()]).expect("should load documents");

    let paths: Vec<PathBuf> = documents.iter().map(|d| d.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            corpus.path().join("link.txt"),
            corpus.path().join("shared/rules.txt")
        ]
    );
    assert_eq!(documents[0].raw_text, "Linked rule.");
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_file_is_skipped() {
    let corpus = write_corpus(&[("rules.txt", b"Readable rule.")]);
    std::os::unix::fs::symlink(
        corpus.path().join("deleted.txt"),
        corpus.path().join("broken.txt"),
    )
    .expect("should create dangling symlink");
    let db_dir = TempDir::new().expect("should create db dir");
    let store = open_store(&db_dir).await;

    let report = IndexBuilder::new(&FakeEmbedder::new(), &store, BuildSettings::default())
        .build(corpus.path())
        .await
        .expect("build should succeed");

    assert_eq!(report.documents, 1);
    assert_eq!(report.collection, 1);
    let entries = store.entries().await.expect("should list entries");
    assert_eq!(entries[0].text, "Readable rule.");
}
