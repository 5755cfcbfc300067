//! # Forge Vault CLI (`forge`)
//!
//! The `forge` binary indexes a markdown vault and answers retrieval
//! queries against it.
//!
//! ## Usage
//!
//! ```bash
//! forge --config ./config/forge.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `forge init` | Create the SQLite database and run schema migrations |
//! | `forge index` | Index new and changed notes (`--full` re-embeds everything) |
//! | `forge search "<query>"` | Ranked chunks for a query |
//! | `forge classify "<query>"` | Show the query strategy |
//! | `forge context "<query>"` | Assembled context block for a model prompt |
//! | `forge browse` | List indexed files |
//! | `forge verify <file> "<claim>"` | Check a claim against one file |
//! | `forge stats` | Index statistics |
//!
//! Logs go to stderr through `tracing`; set `RUST_LOG=debug` for detail.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use forge_vault::progress::ProgressMode;
use forge_vault::{browse, config, indexer, migrate, search, stats};

/// Forge Vault CLI: retrieval and ranking over a markdown notes vault.
///
/// All commands except `classify` read a TOML configuration file. See
/// `config/forge.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "forge",
    about = "Forge Vault: retrieval and ranking over a markdown notes vault",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Index the vault.
    ///
    /// By default only new and changed files are embedded and chunks of
    /// deleted files are removed. Ctrl-C stops after the current file.
    Index {
        /// Re-embed every file, ignoring stored content hashes.
        #[arg(long)]
        full: bool,

        /// Progress output on stderr. Defaults to human on a TTY, off otherwise.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// Search the vault.
    Search {
        query: String,

        /// Maximum number of results (defaults to retrieval.final_limit).
        #[arg(long)]
        limit: Option<usize>,

        /// Disable the inventory bonus and reserved inventory slots.
        #[arg(long)]
        no_inventory_boost: bool,

        /// Print the score breakdown of each result.
        #[arg(long)]
        explain: bool,
    },

    /// Show how a query is classified.
    Classify { query: String },

    /// Print the context block assembled for a query.
    Context {
        query: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// List every indexed file.
    Browse,

    /// Check whether a file supports a claim.
    Verify { filename: String, claim: String },

    /// Show index statistics.
    Stats,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProgressArg {
    Human,
    Json,
    Off,
}

impl From<ProgressArg> for ProgressMode {
    fn from(arg: ProgressArg) -> Self {
        match arg {
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
            ProgressArg::Off => ProgressMode::Off,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let load = || config::load_config(&cli.config);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&load()?).await?;
            println!("Database initialized successfully.");
        }
        Commands::Index { full, progress } => {
            let cfg = load()?;
            let mode = progress
                .map(ProgressMode::from)
                .unwrap_or_else(ProgressMode::default_for_tty);
            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("cancelling after the current file...");
                    on_ctrl_c.cancel();
                }
            });
            indexer::run_index(&cfg, full, mode, cancel).await?;
        }
        Commands::Search {
            query,
            limit,
            no_inventory_boost,
            explain,
        } => {
            search::run_search(&load()?, &query, limit, !no_inventory_boost, explain).await?;
        }
        // Needs no config
        Commands::Classify { query } => search::run_classify(&query)?,
        Commands::Context { query, limit } => {
            search::run_context(&load()?, &query, limit).await?;
        }
        Commands::Browse => browse::run_browse(&load()?).await?,
        Commands::Verify { filename, claim } => {
            browse::run_verify(&load()?, &filename, &claim).await?;
        }
        Commands::Stats => stats::run_stats(&load()?).await?,
    }

    Ok(())
}
