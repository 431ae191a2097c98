//! # puzvault CLI (`pzv`)
//!
//! The `pzv` binary drives everything: database initialization, source
//! management, one-shot import passes, the importer daemon, and the
//! agent worker.
//!
//! ## Usage
//!
//! ```bash
//! pzv --config ./config/pzv.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pzv init` | Create the SQLite database and run schema migrations |
//! | `pzv source add <name>` | Create a source and its folder tree |
//! | `pzv source list` | List configured sources |
//! | `pzv source rm <id-or-code>` | Delete a source, its rows, and its folders |
//! | `pzv source trigger <id-or-code>` | Queue an agent task for a source right now |
//! | `pzv scan` | Run exactly one import pass |
//! | `pzv run` | Importer daemon (filesystem events; `--poll` for intervals) |
//! | `pzv worker` | Agent worker loop with the embedded scheduler |
//! | `pzv reconcile` | Resolve catalog rows orphaned by a crash |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use puzvault::{config, db, import, migrate, scheduler, sources, watcher, worker};

/// puzvault CLI — a self-hosted crossword puzzle aggregator backend.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/pzv.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pzv",
    about = "puzvault — a self-hosted crossword puzzle aggregator backend",
    version,
    long_about = "puzvault ingests crossword puzzle files dropped into per-source import \
    directories (by scheduled agents or by hand), validates and fingerprints them, and \
    catalogs them into a permanent SQLite-backed store with content-hash deduplication."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pzv.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (sources, puzzles, agent_tasks). Idempotent.
    Init,

    /// Manage puzzle sources.
    Source {
        #[command(subcommand)]
        command: SourceCommands,
    },

    /// Run exactly one import pass over all source import directories.
    Scan,

    /// Run the importer daemon.
    ///
    /// Watches every source's import directory for new file pairs and
    /// processes them after a short debounce. With `--poll`, rescans on
    /// a fixed interval instead of subscribing to filesystem events.
    Run {
        /// Poll on a fixed interval instead of watching for events.
        #[arg(long)]
        poll: bool,
    },

    /// Run the agent worker loop (includes the scheduler).
    Worker,

    /// Resolve catalog rows left with an empty file path by a crash.
    Reconcile,
}

#[derive(Subcommand)]
enum SourceCommands {
    /// Create a source and its {import, puzzles, errors} folder tree.
    Add {
        /// Display name.
        name: String,
        /// Short code used as the on-disk folder name (defaults to the id).
        #[arg(long)]
        code: Option<String>,
        /// IANA timezone for agent date math (e.g. America/New_York).
        #[arg(long)]
        timezone: Option<String>,
        /// Agent type from the registry (e.g. null).
        #[arg(long)]
        agent: Option<String>,
        /// Agent configuration as a JSON string.
        #[arg(long)]
        agent_config: Option<String>,
        /// Enable scheduled agent runs every N hours.
        #[arg(long)]
        every_hours: Option<i64>,
    },
    /// List configured sources.
    List,
    /// Queue an agent task for a source right now.
    Trigger {
        /// Source id or short code.
        identifier: String,
    },
    /// Delete a source by id or short code, including rows and folders.
    Rm {
        /// Source id or short code.
        identifier: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&config).await?;
            std::fs::create_dir_all(&config.storage.puzzles_root)?;
            println!("initialized database at {}", config.db.path.display());
        }
        Commands::Source { command } => {
            let pool = db::connect(&config).await?;
            match command {
                SourceCommands::Add {
                    name,
                    code,
                    timezone,
                    agent,
                    agent_config,
                    every_hours,
                } => {
                    let source = sources::create_source(
                        &pool,
                        &config.storage.puzzles_root,
                        sources::NewSource {
                            name,
                            short_code: code,
                            timezone,
                            agent_enabled: agent.is_some(),
                            schedule_enabled: every_hours.is_some(),
                            schedule_interval_hours: every_hours,
                            agent_type: agent,
                            agent_config,
                        },
                    )
                    .await?;
                    println!("created source {} ({})", source.name, source.id);
                    println!("  folder: {}", source.folder_name());
                }
                SourceCommands::List => {
                    let all = sources::list_sources(&pool).await?;
                    if all.is_empty() {
                        println!("no sources configured");
                    }
                    for source in all {
                        println!(
                            "{}  {}  folder={}  agent={}",
                            source.id,
                            source.name,
                            source.folder_name(),
                            source.agent_type.as_deref().unwrap_or("-"),
                        );
                    }
                }
                SourceCommands::Trigger { identifier } => {
                    let source = sources::find_by_id_or_short_code(&pool, &identifier)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("source not found: {identifier}"))?;
                    let task_id = scheduler::enqueue_manual_task(&pool, &source.id).await?;
                    println!("queued task {task_id} for source {}", source.name);
                }
                SourceCommands::Rm { identifier } => {
                    sources::delete_source(&pool, &config.storage.puzzles_root, &identifier)
                        .await?;
                    println!("deleted source {identifier}");
                }
            }
            pool.close().await;
        }
        Commands::Scan => {
            let pool = db::connect(&config).await?;
            let mut seen_unknown = std::collections::HashSet::new();
            let summary = import::run_pass(&config, &pool, &mut seen_unknown).await?;
            println!("scan complete");
            println!("  imported: {}", summary.imported);
            println!("  duplicates dropped: {}", summary.duplicates);
            println!("  quarantined: {}", summary.quarantined);
            pool.close().await;
        }
        Commands::Run { poll } => {
            let pool = db::connect(&config).await?;
            watcher::run(&config, &pool, poll).await?;
            pool.close().await;
        }
        Commands::Worker => {
            let pool = db::connect(&config).await?;
            worker::run(&config, &pool).await?;
            pool.close().await;
        }
        Commands::Reconcile => {
            let pool = db::connect(&config).await?;
            let summary = import::reconcile_orphans(&config, &pool).await?;
            println!("reconcile complete");
            println!("  paths backfilled: {}", summary.backfilled);
            println!("  rows removed: {}", summary.removed);
            pool.close().await;
        }
    }

    Ok(())
}
