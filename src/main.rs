//! # Case Finder CLI (`casefind`)
//!
//! Builds and queries a full-text index over a folder of case documents
//! organized by year (`cases/<year>/<case>.pdf`).
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `casefind init` | Create the index file and schema |
//! | `casefind index --base-dir <dir>` | Index new and changed documents |
//! | `casefind search "<query>"` | Keyword search with optional `--year` |
//! | `casefind stats` | Document counts per year |
//! | `casefind get <path>` | Show the stored text for one document |
//!
//! ## Examples
//!
//! ```bash
//! # First run (or update): index PDFs, OCR the scanned ones
//! casefind index --base-dir ./cases --db ./cases.db --ocr
//!
//! # Search within one year
//! casefind search "theft" --db ./cases.db --year 2020 --limit 20
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use case_finder::config::{self, Config};
use case_finder::progress::ProgressMode;
use case_finder::store::IndexStore;
use case_finder::{get, ingest, search, stats};

/// Case Finder: incremental full-text indexing and keyword search for
/// folders of case documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; command-line flags override values from the file.
#[derive(Parser)]
#[command(
    name = "casefind",
    about = "Case Finder — index and search case documents by year and keyword",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/casefind.toml`; built-in defaults are used when
    /// that file does not exist.
    #[arg(long, global = true, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Increase log verbosity (`-v` info, `-vv` debug). `RUST_LOG` wins if set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the index file and schema.
    ///
    /// Idempotent: an existing index is left untouched and keeps its backend.
    Init {
        /// Index file location (overrides `[db].path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Index documents under a base directory.
    ///
    /// Only files whose modification time changed since the last run are
    /// re-extracted. Press Ctrl-C to stop after the current document.
    Index {
        /// Root folder holding one subfolder per year.
        #[arg(long)]
        base_dir: PathBuf,

        /// Index file location (overrides `[db].path`).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Enable the OCR fallback for scanned documents.
        #[arg(long)]
        ocr: bool,

        /// Directory containing `pdftoppm`, when it is not on PATH.
        #[arg(long)]
        poppler_path: Option<PathBuf>,

        /// Remove index entries for files that no longer exist.
        #[arg(long)]
        prune: bool,

        /// Progress output on stderr (defaults to `human` on a terminal).
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Search indexed documents.
    Search {
        /// Keyword or phrase to look for.
        query: String,

        /// Index file location (overrides `[db].path`).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Only return documents from this year folder (exact match).
        #[arg(long)]
        year: Option<String>,

        /// Maximum number of results.
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        limit: Option<i64>,

        /// Print results as a JSON array.
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics.
    Stats {
        /// Index file location (overrides `[db].path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show the stored record for one document path.
    Get {
        /// Document path; relative paths to existing files are resolved.
        path: String,

        /// Index file location (overrides `[db].path`).
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn with_db(mut cfg: Config, db: Option<PathBuf>) -> Config {
    if let Some(path) = db {
        cfg.db.path = path;
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init { db } => {
            let cfg = with_db(cfg, db);
            let store = IndexStore::create(&cfg.db.path, cfg.db.backend).await?;
            println!(
                "Index initialized at {} (backend: {}).",
                cfg.db.path.display(),
                store.mode()
            );
            store.close().await;
        }
        Commands::Index {
            base_dir,
            db,
            ocr,
            poppler_path,
            prune,
            progress,
        } => {
            let mut cfg = with_db(cfg, db);
            if ocr {
                cfg.extraction.ocr = true;
            }
            if poppler_path.is_some() {
                cfg.extraction.poppler_path = poppler_path;
            }
            let progress = progress.unwrap_or_else(ProgressMode::default_for_tty);
            ingest::run_index_command(&cfg, &base_dir, prune, progress).await?;
        }
        Commands::Search {
            query,
            db,
            year,
            limit,
            json,
        } => {
            let cfg = with_db(cfg, db);
            search::run_search(&cfg, &query, year.as_deref(), limit, json).await?;
        }
        Commands::Stats { db } => {
            stats::run_stats(&with_db(cfg, db)).await?;
        }
        Commands::Get { path, db } => {
            get::run_get(&with_db(cfg, db), &path).await?;
        }
    }

    Ok(())
}
