use clap::{Parser, ValueEnum};
use nfl_rag::Result;
use nfl_rag::assistant::{Assistant, Mode};
use nfl_rag::config::load_from_env;
use nfl_rag::database::VectorStore;
use nfl_rag::provider::OpenAiClient;
use nfl_rag::retrieval::Retriever;

#[derive(Parser)]
#[command(name = "nfl-rag")]
#[command(about = "Answer NFL rules and analytics questions from an indexed rulebook")]
#[command(version)]
struct Cli {
    /// How to answer the question
    #[arg(value_enum)]
    mode: CliMode,
    /// The question, as one or more words
    #[arg(required = true, num_args = 1..)]
    question: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CliMode {
    /// Explain a rule or analytics concept
    #[value(alias = "rule-explain")]
    Explain,
    /// Compare two rules side by side
    #[value(alias = "rule-compare")]
    Compare,
}

impl From<CliMode> for Mode {
    #[inline]
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Explain => Self::Explain,
            CliMode::Compare => Self::Compare,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let question = cli.question.join(" ");

    let config = load_from_env()?;
    let client = OpenAiClient::new(&config.provider)?;
    let store = VectorStore::from_config(&config).await?;

    let assistant = Assistant::new(Retriever::new(&client, &store), &client);
    let mode = Mode::from(cli.mode);

    match mode {
        Mode::Explain => println!("🟦 Question: {}\n", question),
        Mode::Compare => println!("🟦 Compare request: {}\n", question),
    }

    let answer = assistant.answer(mode, &question).await?;

    match mode {
        Mode::Explain => println!("🟩 Answer:\n"),
        Mode::Compare => println!("🟩 Comparison:\n"),
    }
    println!("{}", answer);

    Ok(())
}
