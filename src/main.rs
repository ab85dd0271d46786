//! # DeepKnowledge CLI (`dk`)
//!
//! Ask questions about websites and documents and get answers grounded in
//! them, with the sources cited.
//!
//! ## Usage
//!
//! ```bash
//! dk --config ./config/dk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dk sources` | Load the default sources and list the knowledge base |
//! | `dk ingest` | Add websites (`--url`), files (`--file`), or directories (`--dir`) |
//! | `dk ask "<question>"` | One grounded answer with its sources |
//! | `dk chat` | Interactive session with conversation memory |
//!
//! Logs go to stderr; set `RUST_LOG` or pass `--verbose` for more detail.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use deepknowledge::assistant::Assistant;
use deepknowledge::config::load_config_or_default;
use deepknowledge::ingest::{run_ingest, IngestRequest};
use deepknowledge::{ask, sources};

/// DeepKnowledge: grounded Q&A over your own knowledge base.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dk",
    about = "DeepKnowledge: grounded question answering over websites and documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/dk.toml`; built-in defaults apply when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/dk.toml")]
    config: PathBuf,

    /// Debug-level logging.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the knowledge base.
    ///
    /// Loads the configured default websites and documents directory first.
    Sources,

    /// Add sources to the knowledge base and report what happened to each.
    Ingest {
        /// Website URL to add (repeatable).
        #[arg(long = "url")]
        urls: Vec<String>,

        /// Document file to add: pdf, docx, pptx, xlsx, txt, or md (repeatable).
        #[arg(long = "file")]
        files: Vec<PathBuf>,

        /// Directory scanned recursively with the configured include globs (repeatable).
        #[arg(long = "dir")]
        dirs: Vec<PathBuf>,
    },

    /// Ask one question.
    Ask {
        question: String,

        /// Print the answer and its sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive session.
    ///
    /// Type `quit` to leave, `/sources` to list the knowledge base, and
    /// `/add <url>` to add a website.
    Chat,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "deepknowledge=debug,deepknowledge_core=debug"
    } else {
        "deepknowledge=info,deepknowledge_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = load_config_or_default(&cli.config)?;
    let assistant = Assistant::from_config(cfg).context("Failed to start assistant")?;

    match cli.command {
        Commands::Sources => sources::run_sources(&assistant).await?,
        Commands::Ingest { urls, files, dirs } => {
            run_ingest(&assistant, IngestRequest { urls, files, dirs }).await?
        }
        Commands::Ask { question, json } => ask::run_ask(&assistant, &question, json).await?,
        Commands::Chat => ask::run_chat(&assistant).await?,
    }
    Ok(())
}
