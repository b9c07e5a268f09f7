use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use walk_cli::commands::{history, replay, status, track};
use walk_cli::feed::read_feed;
use walk_cli::snapshot::GeoJsonSnapshots;
use walk_cli::store::WalkStore;
use walk_cli::{Cli, Commands, Config};
use walk_core::{NullSink, SessionFinalizer};
use walk_db::{Database, SharedDatabase};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

/// Builds the finalizer's persistence collaborator from configuration.
fn open_store(config: &Config) -> Result<WalkStore> {
    let db = open_database(config)?;
    let remote = config
        .api_base_url
        .as_deref()
        .map(walk_api::Client::new)
        .transpose()
        .context("invalid api_base_url")?;
    Ok(WalkStore::new(SharedDatabase::new(db), remote))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = std::io::stdout().lock();

    match &cli.command {
        Some(Commands::Track { wait, json }) => {
            let tracker = config.tracker_config()?;
            let finalizer = SessionFinalizer::new(config.user()?, open_store(&config)?);
            let input = BufReader::new(tokio::io::stdin());
            let display = std::io::stderr();
            runtime()?.block_on(async {
                match &config.snapshot_dir {
                    Some(dir) => {
                        let finalizer = finalizer.with_artifacts(GeoJsonSnapshots::new(dir));
                        track::run(&mut stdout, input, display, &tracker, finalizer, *wait, *json)
                            .await
                    }
                    None => {
                        track::run(&mut stdout, input, display, &tracker, finalizer, *wait, *json)
                            .await
                    }
                }
            })?;
        }
        Some(Commands::Replay { file, json }) => {
            let tracker = config.tracker_config()?;
            let entries = read_feed(file)?;
            let finalizer = SessionFinalizer::new(config.user()?, open_store(&config)?);
            let origin = Utc::now();
            runtime()?.block_on(async {
                match &config.snapshot_dir {
                    Some(dir) => {
                        let finalizer = finalizer.with_artifacts(GeoJsonSnapshots::new(dir));
                        replay::run(&mut stdout, &entries, &tracker, NullSink, &finalizer, origin, *json)
                            .await
                    }
                    None => {
                        replay::run(&mut stdout, &entries, &tracker, NullSink, &finalizer, origin, *json)
                            .await
                    }
                }
            })?;
        }
        Some(Commands::History { limit, json }) => {
            let db = open_database(&config)?;
            history::run(&mut stdout, &db, *limit, *json)?;
        }
        Some(Commands::Status) => {
            let db = open_database(&config)?;
            status::run(&mut stdout, &db, &config)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
