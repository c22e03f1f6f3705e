//! # DocSage
//! Document-grounded conversational assistant.
//!
//! Usage:
//!   docsage serve                                  # Start the webhook gateway
//!   docsage serve --port 8080                      # Custom port
//!   docsage ingest --user <id> --name <name> a.pdf # Ingest documents

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "docsage",
    version,
    about = "Document-grounded conversational assistant"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Start the webhook gateway server
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ingest PDF documents as a named document set
    Ingest {
        /// Owning user id
        #[arg(long)]
        user: String,
        /// Document set name
        #[arg(long)]
        name: String,
        /// PDF files, in order
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = docsage_core::config::DocSageConfig::load()?;

    match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            docsage_gateway::start(config).await
        }
        Command::Ingest { user, name, files } => {
            if files.is_empty() {
                anyhow::bail!("no files given");
            }
            let store = Arc::new(docsage_store::Store::open(&config.store.resolved_db_path())?);
            let oracle = Arc::new(docsage_providers::OracleClient::new(config.oracle.clone())?);
            let index = Arc::new(docsage_index::IndexClient::new(config.index.clone())?);
            let ingestor =
                docsage_ingest::Ingestor::new(store, oracle, index, config.ingest.clone());

            let mut blobs = Vec::with_capacity(files.len());
            for file in &files {
                blobs.push(std::fs::read(file)?);
            }
            // Long-running: the embedding retry loop runs here, off any
            // request deadline.
            let id = ingestor.ingest(&blobs, &name, &user).await?;
            println!("document set indexed: {id}");
            Ok(())
        }
    }
}
