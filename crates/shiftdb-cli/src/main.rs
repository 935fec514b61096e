mod commands;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shiftdb_config::{AppConfig, ConfigLoader};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shiftdb", author, version, about = "Timestamped SQL migrations for SQLite")]
struct Cli {
    /// Config file (defaults to ./shiftdb.yml, ./shiftdb.yaml or ./shiftdb.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter; overrides RUST_LOG
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Database file, overriding config and SHIFTDB_DATABASE_PATH
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Migrations directory, overriding config and SHIFTDB_MIGRATIONS_DIR
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply every pending migration, oldest first
    RunMigrations,
    /// Revert the most recently applied migration
    RevertMigration,
    /// List migrations and whether each has been applied
    ShowMigrations {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
        /// Exit non-zero when any migration is pending
        #[arg(long)]
        check: bool,
    },
    /// Write empty up/down files for a new migration
    CreateMigration {
        /// Migration name, e.g. CreatePost
        name: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref());
    ConfigLoader::load_dotenv();

    let config = load_config(&cli)?;

    match cli.command {
        Command::RunMigrations => commands::run_migrations(&config)?,
        Command::RevertMigration => commands::revert_migration(&config)?,
        Command::ShowMigrations { json, check } => {
            let pending = commands::show_migrations(&config, json)?;
            if check && pending > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::CreateMigration { name } => commands::create_migration(&config, &name)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::discover(),
    };
    let mut config = loader.load().context("failed to load configuration")?;

    if let Some(database) = &cli.database {
        config.database.path = database.clone();
    }
    if let Some(dir) = &cli.dir {
        config.migrations.directory = dir.clone();
    }
    ConfigLoader::validate(&config).context("invalid command-line overrides")?;
    Ok(config)
}

fn setup_logging(log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level.to_lowercase()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // stdout is reserved for command output (e.g. --json)
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}
