//! RAG CLI - Command-line interface for the RAG demo.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use rag_core::{
    ChatModel, Embedder, EmbeddingProvider, RagConfig, RagError, Result, SearchResult, SearchType,
    Speaker, VectorStore,
};
use rag_embed::HashEmbedder;
use rag_generate::{AnswerGenerator, HistoryAwareGenerator, ScriptedChatModel};
use rag_ingest::IngestionPipeline;
use rag_ollama::{OllamaChat, OllamaClient, OllamaEmbedder};
use rag_query::Retriever;
use rag_store::SqliteVectorIndex;

/// RAG - ingest text files, retrieve relevant chunks and answer questions
#[derive(Parser)]
#[command(name = "rag")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/rag-demo/config.toml, then ./rag-demo.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Index directory (overrides ingestion.persist_directory)
    #[arg(short, long, global = true)]
    persist: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use the hash embedder and extractive answers instead of Ollama
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, split and index the documents directory
    Ingest {
        /// Directory of text files
        #[arg(short, long)]
        docs: Option<PathBuf>,

        /// Window size in characters
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters shared by consecutive windows
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Recursively load subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Delete the existing index and build it again
        #[arg(long)]
        rebuild: bool,
    },

    /// Show the chunks retrieved for a query
    Retrieve {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Drop results scoring below this similarity
        #[arg(short, long)]
        threshold: Option<f32>,
    },

    /// Answer one question from the indexed documents
    Ask {
        /// Question
        query: String,
    },

    /// Interactive session that remembers earlier questions
    Chat,

    /// Show index statistics
    Stats,

    /// Print the effective configuration
    Config,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(err: &RagError) {
    eprintln!("Error [{}]: {}", err.error_code(), err);
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => RagConfig::load(path)?,
        None => RagConfig::load_default()?,
    };
    if let Some(persist) = cli.persist {
        config.ingestion.persist_directory = persist;
    }

    match cli.command {
        Commands::Ingest {
            docs,
            chunk_size,
            chunk_overlap,
            recursive,
            rebuild,
        } => {
            if let Some(docs) = docs {
                config.ingestion.docs_path = docs;
            }
            if let Some(size) = chunk_size {
                config.ingestion.chunk_size = size;
            }
            if let Some(overlap) = chunk_overlap {
                config.ingestion.chunk_overlap = overlap;
            }
            config.ingestion.recursive |= recursive;
            config.validate()?;

            ingest(&config, cli.offline, rebuild).await
        }
        Commands::Retrieve {
            query,
            top_k,
            threshold,
        } => {
            if let Some(k) = top_k {
                config.retrieval.k = k;
            }
            if let Some(t) = threshold {
                config.retrieval.search_type = SearchType::SimilarityScoreThreshold;
                config.retrieval.score_threshold = Some(t);
            }
            config.validate()?;

            retrieve(&config, cli.offline, &query).await
        }
        Commands::Ask { query } => {
            config.validate()?;
            ask(&config, cli.offline, &query).await
        }
        Commands::Chat => {
            config.validate()?;
            chat(&config, cli.offline).await
        }
        Commands::Stats => {
            config.validate()?;
            stats(&config.ingestion.persist_directory).await
        }
        Commands::Config => {
            config.validate()?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn build_embedder(config: &RagConfig, offline: bool) -> Result<Arc<dyn Embedder>> {
    if offline || config.embedding.provider == EmbeddingProvider::Hash {
        if config.embedding.dimension == 0 {
            return Err(RagError::config("embedding dimension must be at least 1"));
        }
        debug!("Using hash embedder ({} dims)", config.embedding.dimension);
        return Ok(Arc::new(HashEmbedder::with_dimension(
            config.embedding.dimension,
        )));
    }

    let client = OllamaClient::new(&config.service)?;
    Ok(Arc::new(OllamaEmbedder::new(
        client,
        config.embedding.model.clone(),
    )))
}

fn build_chat(config: &RagConfig, offline: bool) -> Result<Arc<dyn ChatModel>> {
    if offline {
        debug!("Using extractive offline chat model");
        return Ok(Arc::new(ScriptedChatModel::extractive()));
    }

    let client = OllamaClient::new(&config.service)?;
    Ok(Arc::new(OllamaChat::new(client, config.chat.model.clone())))
}

fn open_retriever(config: &RagConfig, offline: bool) -> Result<Retriever> {
    let embedder = build_embedder(config, offline)?;
    Retriever::open(
        &config.ingestion.persist_directory,
        embedder,
        config.retrieval.clone(),
    )
}

async fn ingest(config: &RagConfig, offline: bool, rebuild: bool) -> Result<()> {
    let embedder = build_embedder(config, offline)?;
    let mut pipeline = IngestionPipeline::new(config.ingestion.clone(), embedder)?;

    let (index, report) = if rebuild {
        pipeline.rebuild().await?
    } else {
        pipeline.run().await?
    };

    let dir = index.directory().display();
    if report.reused {
        println!("Using existing index at {} ({} chunks)", dir, report.chunks);
        if report.stale {
            println!("Documents or chunk settings changed since it was built; run with --rebuild to refresh it.");
        }
    } else {
        println!(
            "Indexed {} chunks from {} documents into {} in {}ms",
            report.chunks, report.documents, dir, report.elapsed_ms
        );
    }
    Ok(())
}

async fn retrieve(config: &RagConfig, offline: bool, query: &str) -> Result<()> {
    let retriever = open_retriever(config, offline)?;
    let results = retriever.retrieve(query).await?;

    if results.is_empty() {
        println!("No relevant chunks found.");
        return Ok(());
    }
    for result in &results {
        print_result(result);
    }
    Ok(())
}

fn print_result(result: &SearchResult) {
    let meta = &result.chunk.metadata;
    println!(
        "{}. [{:.3}] {} (chunk {})",
        result.rank, result.score, meta.source, meta.chunk_index
    );
    let preview: String = result.chunk.text.chars().take(200).collect();
    for line in preview.lines() {
        println!("   {}", line);
    }
    println!();
}

fn print_sources(sources: &[SearchResult]) {
    if sources.is_empty() {
        return;
    }
    println!("\nSources:");
    for result in sources {
        println!(
            "  {}. {} (chunk {}, score {:.3})",
            result.rank, result.chunk.metadata.source, result.chunk.metadata.chunk_index, result.score
        );
    }
}

async fn ask(config: &RagConfig, offline: bool, query: &str) -> Result<()> {
    let retriever = open_retriever(config, offline)?;
    let chat = build_chat(config, offline)?;
    let generator = AnswerGenerator::from_config(retriever, chat, &config.generation);

    let answer = generator.generate_answer(query).await?;
    println!("{}", answer.text);
    print_sources(&answer.sources);
    Ok(())
}

async fn chat(config: &RagConfig, offline: bool) -> Result<()> {
    let retriever = open_retriever(config, offline)?;
    let chat = build_chat(config, offline)?;
    let mut generator = HistoryAwareGenerator::new(retriever, chat, &config.generation);

    println!("Ask a question. Commands: /history, /clear, /exit");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let input = line.trim();

        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                generator.clear_history();
                println!("History cleared.");
            }
            "/history" => {
                if generator.history().is_empty() {
                    println!("No history yet.");
                }
                for turn in generator.history().turns() {
                    let who = match turn.speaker {
                        Speaker::Human => "You",
                        Speaker::Assistant => "Assistant",
                    };
                    println!("{}: {}", who, turn.content);
                }
            }
            question => match generator.ask(question).await {
                Ok(answer) => {
                    if answer.query != question {
                        println!("(searched: {})", answer.query);
                    }
                    println!("{}", answer.text);
                    print_sources(&answer.sources);
                }
                // Keep the session alive; the failed question is not recorded.
                Err(e) => report(&e),
            },
        }
    }
    Ok(())
}

async fn stats(persist_directory: &Path) -> Result<()> {
    let index = SqliteVectorIndex::open(persist_directory)?;
    let stats = index.stats().await?;

    println!("Index: {}", persist_directory.display());
    println!("  Chunks:          {}", stats.chunks);
    println!("  Documents:       {}", stats.sources);
    println!(
        "  Dimension:       {}",
        stats
            .dimension
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "  Embedding model: {}",
        stats.embedding_model.as_deref().unwrap_or("-")
    );
    println!("  Metric:          {}", stats.distance_metric);
    println!("  Size:            {} bytes", stats.storage_bytes);
    Ok(())
}
