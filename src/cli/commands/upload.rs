//! Upload command implementation

use std::path::PathBuf;

use crate::cli::error::CliError;
use crate::cli::output::{OutputFormat, format_json, format_pipeline_report};
use crate::database::PostgresDatabase;
use crate::legacy::LegacyDetection;
use crate::upload::{UploadConfig, run_pipeline};

use super::ConnectionArgs;

#[derive(clap::Args, Debug)]
pub struct UploadArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory with `.csv` / `.csv.gz` files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Target schema
    #[arg(long)]
    pub schema: Option<String>,

    /// JSON file with constraint declarations
    #[arg(long)]
    pub constraints: Option<PathBuf>,

    /// Keep the existing schema instead of dropping and recreating it
    #[arg(long)]
    pub no_reset: bool,

    /// Drop each table before creating it
    #[arg(long)]
    pub drop_tables: bool,

    /// Only treat values that fully parse as legacy blobs
    #[arg(long)]
    pub strict_legacy: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

impl UploadArgs {
    /// Configuration file first, then flags and environment on top
    pub fn to_config(&self) -> Result<UploadConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => UploadConfig::from_file(path)?,
            None => UploadConfig::default(),
        };
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(schema) = &self.schema {
            config.schema = schema.clone();
        }
        if let Some(constraints) = &self.constraints {
            config.constraints_file = Some(constraints.clone());
        }
        if self.no_reset {
            config.reset_schema = false;
        }
        if self.drop_tables {
            config.drop_existing_tables = true;
        }
        if self.strict_legacy {
            config.classifier.legacy_detection = LegacyDetection::Strict;
        }
        config.database = self.connection.apply(config.database);
        Ok(config)
    }
}

/// Handle the upload command
pub async fn handle_upload(args: &UploadArgs) -> Result<(), CliError> {
    let config = args.to_config()?;
    if !config.data_dir.is_dir() {
        return Err(CliError::InvalidArgument(format!(
            "data directory {} does not exist",
            config.data_dir.display()
        )));
    }

    eprintln!(
        "Uploading {} into {}@{}:{}/{} (schema {})",
        config.data_dir.display(),
        config.database.username,
        config.database.host,
        config.database.port,
        config.database.database,
        config.schema
    );

    let database = PostgresDatabase::connect(&config.database).await?;
    let report = run_pipeline(database, &config).await?;

    match args.format {
        OutputFormat::Json => println!("{}", format_json(&report)?),
        OutputFormat::Text => print!("{}", format_pipeline_report(&report)),
    }

    if let Some(constraints) = &report.constraints {
        let failures = constraints.failures().count();
        if failures > 0 {
            return Err(CliError::ConstraintFailures(failures));
        }
    }
    Ok(())
}
