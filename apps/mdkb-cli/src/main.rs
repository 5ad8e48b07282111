use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mdkb_core::config::{ChatOverrides, Config};
use mdkb_engine::{AskOutcome, BuildOutcome, QaEngine};

mod render;

#[derive(Parser)]
#[command(name = "mdkb", version, about = "Semantic search and Q&A over a folder of Markdown files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan, split, embed and store every Markdown file under a directory.
    Index {
        #[arg(short = 'd', long, default_value = "./docs")]
        docs_dir: PathBuf,
        /// Add to the existing collection instead of replacing it.
        #[arg(long)]
        append: bool,
    },
    /// Similarity search; interactive when no question is given.
    Query {
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        question: Option<String>,
    },
    /// Answer a question with a chat model grounded on retrieved chunks.
    Ask {
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(short = 'm', long)]
        model: Option<String>,
        question: Option<String>,
    },
    /// Show collection status and size.
    Stats,
}

const EMPTY_INDEX_HINT: &str = "The index is empty. Build it first, e.g. `mdkb index --docs-dir ./docs`.";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;
    let engine = QaEngine::from_settings(&settings)?;
    let default_top_k = engine.settings().top_k;

    match cli.command {
        Command::Index { docs_dir, append } => {
            engine.ensure_ready()?;
            match engine.build_index(&docs_dir, !append).await? {
                BuildOutcome::Built(summary) => println!("{}", render::summary(&summary)),
                BuildOutcome::NoDocuments { message } => eprintln!("Indexing skipped: {}", message),
            }
        }
        Command::Query { top_k, question } => {
            if !index_ready(&engine).await? { return Ok(()); }
            let top_k = top_k.unwrap_or(default_top_k);
            let engine = &engine;
            for_each_question(question, |q| async move {
                let results = engine.query(&q, top_k).await?;
                if results.is_empty() {
                    println!("No relevant results.");
                } else {
                    println!("{}", render::results(&results));
                }
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        }
        Command::Ask { top_k, base_url, api_key, model, question } => {
            if !index_ready(&engine).await? { return Ok(()); }
            let top_k = top_k.unwrap_or(default_top_k);
            let overrides = ChatOverrides { base_url, api_key, model };
            let overrides = &overrides;
            let engine = &engine;
            for_each_question(question, |q| async move {
                match engine.ask_with_ai(&q, top_k, overrides).await? {
                    AskOutcome::Answered(answer) => println!("{}", render::answer(&answer)),
                    other => {
                        if let Some(msg) = other.error_message() { eprintln!("Error: {}", msg); }
                        if other.context_count() > 0 {
                            println!("{}", render::results(other.contexts()));
                        }
                    }
                }
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        }
        Command::Stats => {
            let stats = engine.stats().await?;
            println!("{}", render::stats(engine.collection(), &stats));
        }
    }
    engine.close().await?;
    Ok(())
}

async fn index_ready(engine: &QaEngine) -> Result<bool> {
    let stats = engine.stats().await?;
    if !stats.exists || stats.row_count == 0 {
        eprintln!("{}", EMPTY_INDEX_HINT);
        return Ok(false);
    }
    Ok(true)
}

/// Runs `handle` once for `question`, or for every line read from stdin until `q`/`quit`/`exit`.
async fn for_each_question<F, Fut>(question: Option<String>, mut handle: F) -> Result<()>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    if let Some(q) = question {
        return handle(q).await;
    }
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nQuestion: ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let q = line?.trim().to_string();
        if q.is_empty() { continue; }
        if matches!(q.to_lowercase().as_str(), "q" | "quit" | "exit") { break; }
        if let Err(e) = handle(q).await {
            eprintln!("Query failed: {:#}", e);
        }
    }
    println!("Bye!");
    Ok(())
}
