use nfl_rag::Result;
use nfl_rag::config::load_from_env;
use nfl_rag::database::VectorStore;
use nfl_rag::indexer::{BuildSettings, IndexBuilder};
use nfl_rag::provider::OpenAiClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = load_from_env()?;
    let client = OpenAiClient::new(&config.provider)?;
    let store = VectorStore::from_config(&config).await?;

    let corpus = config.corpus_path();
    println!("Building index from {}", corpus.display());

    let report = IndexBuilder::new(&client, &store, BuildSettings::from(&config))
        .build(&corpus)
        .await?;

    println!("Loaded {} documents", report.documents);
    println!("Created {} chunks", report.chunks);
    println!(
        "Index build complete: {} entries in collection '{}'",
        report.collection, config.index.collection
    );

    Ok(())
}
