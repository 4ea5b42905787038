//! # tucson CLI entry point
//!
//! Parses the command line and dispatches to the subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tucson_cli::expire::run_expire_verifications;
use tucson_cli::sync::run_sync_users;

/// Tucson operator commands.
#[derive(Parser, Debug)]
#[command(name = "tucson", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create local accounts for identity-provider users that lack one.
    SyncUsers,

    /// Expire verification requests that are past their deadline.
    ExpireVerifications,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::SyncUsers => run_sync_users().await,
        Commands::ExpireVerifications => run_expire_verifications().await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("💥 {e:#}");
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
