use anyhow::{Context, Result};
use chatrag::chat::{ChatDispatcher, InlineFileSource};
use chatrag::ingest::{file_id_for_bytes, guess_media_type, FileDescriptor};
use chatrag::server::HttpServer;
use chatrag::service::RagService;
use chatrag::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "chatrag", version)]
#[command(about = "Answer questions from documents shared in a chat workspace")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (chat events, queries, reset)
    Serve {
        /// Override http_server.port from config.toml
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Index local files into a fresh index and answer one question
    Ask {
        /// File to index (repeatable)
        #[arg(short, long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Number of chunks to retrieve (defaults to search.default_k)
        #[arg(short, long)]
        k: Option<usize>,

        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", &config.chatrag.log_level),
    )
    .init();

    match cli.command {
        Command::Serve { port } => run_http_server(config, port).await,
        Command::Ask { files, k, question } => run_ask(config, files, k, question).await,
    }
}

async fn run_http_server(config: Config, port: Option<u16>) -> Result<()> {
    log::info!("Starting chatrag HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let service = Arc::new(RagService::from_config(&config)?);
    let dispatcher = Arc::new(ChatDispatcher::new(
        Arc::clone(&service),
        Arc::new(InlineFileSource),
        &config.chat,
    )?);

    let server = HttpServer::new(service, dispatcher, &config.http_server)?;
    server.run(port.unwrap_or(config.http_server.port)).await?;

    Ok(())
}

async fn run_ask(config: Config, files: Vec<PathBuf>, k: Option<usize>, question: String) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("Question cannot be empty");
    }

    let service = RagService::from_config(&config)?;
    let start = Instant::now();

    for path in &files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let descriptor = FileDescriptor::new(file_id_for_bytes(&bytes), guess_media_type(path), name);

        let ids = service.index_file(bytes, &descriptor, None).await?;
        println!("Indexed {}: {} chunks", descriptor.display_name(), ids.len());
    }
    log::info!("Indexed {} files in {:?}", files.len(), start.elapsed());

    let answer = service.answer(question.trim(), None, k).await?;
    println!("\n{}", answer.answer);

    if answer.is_grounded() {
        println!("\nSources:");
        for source in &answer.sources {
            println!("  [{}] {} (score {:.3})", source.rank, source.filename, source.score);
        }
    }

    Ok(())
}
