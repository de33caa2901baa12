mod commands;
mod config;

use std::io;
use std::path::PathBuf;

use clap::Parser;
use tracing::debug;

use crate::commands::Command;
use crate::config::Config;

/// Operator tool for raids and their softlocks.
#[derive(Debug, Parser)]
#[command(name = "softlock", version)]
struct Cli {
    /// SQLite database file (overrides SOFTLOCK_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "softlock=info,softlock_db=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(path) = cli.db {
        config.db_path = path;
    }

    let db = softlock_db::Database::open_with(&config.db_path, config.db)?;
    debug!("Running {:?}", cli.command);

    let stdout = io::stdout();
    commands::run(&db, cli.command, &mut stdout.lock())
}
