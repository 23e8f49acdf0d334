//! # Pawlog CLI (`pawlog`)
//!
//! ## Usage
//!
//! ```bash
//! pawlog --config ./config/pawlog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pawlog init` | Create the SQLite database and schema |
//! | `pawlog subject add <name>` | Register a dog |
//! | `pawlog subject list` | List registered dogs |
//! | `pawlog import <file.jsonl>` | Import raw logs, one JSON entry per line |
//! | `pawlog rebuild <subject>` | Recompute weekly summaries and timelines |
//! | `pawlog index internal <subject>` | Index stored weeks for retrieval |
//! | `pawlog index external` | Index the advice document folder |
//! | `pawlog search <subject> "<query>"` | Search both corpora |
//! | `pawlog ask <subject> "<question>"` | Answer a question from retrieved context |
//! | `pawlog summary <subject> --week <date>` | Show one stored week |
//! | `pawlog stats` | Database overview |
//! | `pawlog serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! pawlog init
//! pawlog subject add Bori
//! pawlog import ./logs/march.jsonl
//! pawlog rebuild Bori --since 2024-03-01 --until 2024-03-31
//! pawlog index internal Bori --since 2024-03-01 --until 2024-03-31
//! pawlog index external --dir ./data/documents
//! pawlog ask Bori "Is she eating enough?"
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pawlog::progress::ProgressMode;
use pawlog::sqlite_store::SqliteStore;
use pawlog::weekly::RangeArgs;
use pawlog::{config, db, index_cmd, migrate, search, server, stats, subjects, weekly};

/// Pawlog: weekly summaries and question answering over a dog's daily logs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pawlog.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "pawlog", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pawlog.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a TTY, otherwise `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Manage tracked dogs.
    Subject {
        #[command(subcommand)]
        action: SubjectAction,
    },

    /// Import raw logs from a JSON-lines file.
    Import {
        /// File with one log entry per line.
        path: PathBuf,
    },

    /// Recompute weekly summaries and timelines for a date range.
    ///
    /// Defaults to the last `retrieval.lookback_days` days ending today.
    Rebuild {
        /// Subject ID or name.
        subject: String,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// Chunk, embed, and store documents for retrieval.
    Index {
        #[command(subcommand)]
        corpus: IndexCorpus,
    },

    /// Search a dog's history and the advice corpus.
    Search {
        /// Subject ID or name.
        subject: String,
        query: String,
    },

    /// Answer a question about a dog from retrieved context.
    Ask {
        /// Subject ID or name.
        subject: String,
        question: String,
    },

    /// Show the stored summary and timeline of one week.
    Summary {
        /// Subject ID or name.
        subject: String,

        /// Any date inside the week (YYYY-MM-DD).
        #[arg(long)]
        week: String,
    },

    /// Show database statistics.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum SubjectAction {
    /// Register a dog.
    Add { name: String },
    /// List registered dogs.
    List,
}

#[derive(Subcommand)]
enum IndexCorpus {
    /// Index stored weekly summaries and timelines for one dog.
    Internal {
        /// Subject ID or name.
        subject: String,

        #[command(flatten)]
        range: RangeArgs,
    },
    /// Index the advice document folder.
    External {
        /// Override `[advice].root`.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    let pool = db::connect(&cfg).await?;
    if matches!(cli.command, Commands::Init) {
        migrate::apply(&pool).await?;
        println!("Database initialized successfully.");
        pool.close().await;
        return Ok(());
    }

    let store = Arc::new(SqliteStore::new(pool.clone()));
    let result = match cli.command {
        Commands::Init => Ok(()),
        Commands::Subject { action } => match action {
            SubjectAction::Add { name } => subjects::run_subject_add(&store, &name).await,
            SubjectAction::List => subjects::run_subject_list(&store).await,
        },
        Commands::Import { path } => subjects::run_import(&store, &path).await,
        Commands::Rebuild { subject, range } => {
            weekly::run_rebuild(&cfg, &store, &subject, &range, progress).await
        }
        Commands::Index { corpus } => match corpus {
            IndexCorpus::Internal { subject, range } => {
                index_cmd::run_index_internal(&cfg, &store, &subject, &range, progress)
                    .await
            }
            IndexCorpus::External { dir } => {
                index_cmd::run_index_external(&cfg, &store, dir.as_deref(), progress)
                    .await
            }
        },
        Commands::Search { subject, query } => {
            search::run_search(&cfg, &store, &subject, &query).await
        }
        Commands::Ask { subject, question } => {
            search::run_ask(&cfg, &store, &subject, &question).await
        }
        Commands::Summary { subject, week } => weekly::run_summary(&store, &subject, &week).await,
        Commands::Stats => stats::run_stats(&cfg, store.pool()).await,
        Commands::Serve => server::run_server(&cfg, store.clone()).await,
    };

    pool.close().await;
    result
}
