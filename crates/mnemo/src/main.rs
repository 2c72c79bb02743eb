//! mnemo - conversation memory with semantic recall
//!
//! Operator CLI for inspecting session snapshots and the semantic index.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};

mod commands;

use commands::{check, history, index, search, sessions};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// mnemo - conversation memory with semantic recall
#[derive(Parser)]
#[command(name = "mnemo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Load this config file instead of discovering one
    #[arg(short, long, global = true, env = "MNEMO_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List stored sessions
    Sessions(sessions::SessionsArgs),

    /// Print a session's message history
    History(history::HistoryArgs),

    /// Semantic search over stored messages
    Search(search::SearchArgs),

    /// Rebuild a session's entries in the semantic index
    Reindex(index::ReindexArgs),

    /// Clear a session and remove it from the semantic index
    Forget(index::ForgetArgs),

    /// Check vector database and embedding configuration
    Check(check::CheckArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "mnemo=debug,mnemo_session=debug,mnemo_memory=debug,mnemo_embeddings=debug,mnemo_config=debug,info"
    } else {
        "mnemo=info,mnemo_session=warn,mnemo_memory=warn,mnemo_embeddings=warn,warn"
    };

    let log_dir = mnemo_config::xdg_config_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "mnemo.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "mnemo=trace,mnemo_session=trace,mnemo_memory=trace,mnemo_embeddings=trace,mnemo_config=trace,info",
                )),
        )
        .init();

    let loaded = match &cli.config {
        Some(path) => mnemo_config::load_explicit(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => mnemo_config::load_config(None)?,
    };
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }
    tracing::debug!(sources = ?loaded.loaded_from(), "Configuration loaded");

    let ctx = commands::Context {
        config: loaded.config,
        json_output: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Sessions(args) => sessions::run(args, &ctx).await,
        Commands::History(args) => history::run(args, &ctx).await,
        Commands::Search(args) => search::run(args, &ctx).await,
        Commands::Reindex(args) => index::run_reindex(args, &ctx).await,
        Commands::Forget(args) => index::run_forget(args, &ctx).await,
        Commands::Check(args) => check::run(args, &ctx).await,
    }
}
