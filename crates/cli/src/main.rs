//! engram CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Interactive conversation or single-message mode
//! - `gateway` — Start the HTTP API server
//! - `ingest`  — Load a document into semantic memory
//! - `memory`  — Query one memory tier
//! - `stats`   — Show memory statistics across all tiers
//! - `reset`   — Erase memory tiers

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "engram",
    about = "engram — a conversational agent with tiered memory",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the memory agent
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ingest a document into semantic memory
    Ingest {
        /// Path to a text file
        path: String,

        /// Source label stored with each chunk (defaults to the file name)
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Query one memory tier (working, episodic, semantic, procedural)
    Memory {
        /// The tier to query
        tier: String,

        /// The search query
        query: String,

        /// Maximum results to return
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show memory statistics across all tiers
    Stats,

    /// Erase memory. Without --tier, erases all long-term tiers.
    Reset {
        /// Erase only this tier
        #[arg(short, long)]
        tier: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Gateway { port } => commands::gateway::run(port).await?,
        Commands::Ingest { path, source } => commands::ingest::run(&path, source).await?,
        Commands::Memory { tier, query, limit } => {
            commands::memory::run(&tier, &query, limit).await?
        }
        Commands::Stats => commands::stats::run().await?,
        Commands::Reset { tier } => commands::reset::run(tier).await?,
    }

    Ok(())
}
