//! CLI entry point for `tabload`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tabload::cli::commands::constraints::{ConstraintsArgs, handle_constraints};
use tabload::cli::commands::ddl::{DdlArgs, handle_ddl};
use tabload::cli::commands::normalize::{NormalizeArgs, handle_normalize};
use tabload::cli::commands::upload::{UploadArgs, handle_upload};
use tabload::cli::logging::{self, LogConfig};

#[derive(Parser, Debug)]
#[command(
    name = "tabload",
    version,
    about = "Load CSV exports into PostgreSQL with inferred types and repaired constraints"
)]
struct Cli {
    /// Log level or filter directive; `RUST_LOG` wins when set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create tables for a directory of CSV files, load them and apply constraints
    Upload(UploadArgs),
    /// Print the CREATE TABLE statement inferred for one CSV file
    Ddl(DdlArgs),
    /// Repair foreign keys and apply constraint declarations to loaded tables
    Constraints(ConstraintsArgs),
    /// Convert one legacy serialized value to JSON
    Normalize(NormalizeArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&LogConfig {
        level: Some(cli.log_level.clone()),
        json: cli.log_json,
    });

    let result = match &cli.command {
        Command::Upload(args) => handle_upload(args).await,
        Command::Ddl(args) => handle_ddl(args),
        Command::Constraints(args) => handle_constraints(args).await,
        Command::Normalize(args) => handle_normalize(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
