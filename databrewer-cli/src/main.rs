//! Databrewer - search, inspect and download datasets described by recipes
//!
//! Every command loads the layered configuration first, then works against
//! the recipe index under the configured root directory.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use databrewer_core::{ConfigLoader, Overrides, Settings};

mod config_cli;
mod dataset_cli;
mod output;

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[clap(
    name = "databrewer",
    about = "Search, inspect and download datasets described by recipes",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Suppress progress bars and status messages
    #[clap(long, short, global = true)]
    quiet: bool,

    /// Configuration file to read instead of ~/.databrewerrc
    #[clap(long, global = true, value_name = "PATH")]
    rcfile: Option<PathBuf>,

    /// Root directory for the index and default recipes
    #[clap(long, global = true, value_name = "DIR")]
    root_dir: Option<PathBuf>,

    /// Recipe directory to index (repeatable, replaces the configured list)
    #[clap(long, global = true, value_name = "DIR")]
    recipes_dir: Vec<PathBuf>,

    /// Directory datasets are downloaded into
    #[clap(long, global = true, value_name = "DIR")]
    datasets_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
enum Command {
    /// Download the default recipes and rebuild the index
    Update {
        /// Discard the existing index before rebuilding
        #[clap(long)]
        recreate: bool,
    },

    /// List all indexed datasets
    List {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Search datasets by name, description and keywords
    Search {
        /// Search terms; every term must match
        #[clap(required = true)]
        query: Vec<String>,

        /// Output as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show details of a dataset and its files
    Info {
        /// Dataset name, optionally with a file pattern: name[pattern]
        name_spec: String,

        /// Check each file's availability and size
        #[clap(long)]
        check: bool,
    },

    /// Download the files of a dataset
    Download {
        /// Dataset name, optionally with a file pattern: name[pattern]
        name_spec: String,

        /// Directory to save files into (default: <datasets_dir>/<name>)
        #[clap(long, short)]
        output_dir: Option<PathBuf>,

        /// Skip the confirmation prompt and overwrite existing files
        #[clap(long, short)]
        force: bool,
    },

    /// Print local paths of a dataset's files
    Files {
        /// Dataset name, optionally with a file pattern: name[pattern]
        name_spec: String,
    },

    /// Inspect the resolved configuration
    Config {
        #[clap(subcommand)]
        command: config_cli::ConfigCommand,
    },
}

fn initialize_tracing(log_level: &LogLevel) {
    let filter = EnvFilter::try_from_env("DATABREWER_LOG")
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_filter_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let overrides = Overrides {
        rcfile: cli.rcfile.clone(),
        root_dir: cli.root_dir.clone(),
        datasets_dir: cli.datasets_dir.clone(),
        recipes_dir: cli.recipes_dir.clone(),
    };

    let settings = ConfigLoader::from_process()?
        .load(&overrides)
        .context("Failed to load configuration")?;
    settings.ensure_dirs()?;
    debug!(root = %settings.root_dir.display(), "Loaded configuration");
    Ok(settings)
}

async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    let quiet = cli.quiet;

    match cli.command {
        Command::Update { recreate } => dataset_cli::update(&settings, recreate, quiet).await,
        Command::List { json } => dataset_cli::list(&settings, json),
        Command::Search { query, json } => dataset_cli::search(&settings, &query, json),
        Command::Info { name_spec, check } => dataset_cli::info(&settings, &name_spec, check).await,
        Command::Download {
            name_spec,
            output_dir,
            force,
        } => dataset_cli::download(&settings, &name_spec, output_dir, force, quiet).await,
        Command::Files { name_spec } => dataset_cli::files(&settings, &name_spec),
        Command::Config { command } => command.execute(&settings),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    initialize_tracing(&cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
