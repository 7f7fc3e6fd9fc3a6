//! DDL command implementation

use std::path::PathBuf;

use crate::batch::csv::{CsvReadOptions, read_csv_file};
use crate::cli::error::CliError;
use crate::inference::{ClassifierConfig, TypeClassifier};
use crate::legacy::LegacyDetection;
use crate::schema::{DEFAULT_SCHEMA, SchemaGenerator};
use crate::upload::table_name_for;

#[derive(clap::Args, Debug)]
pub struct DdlArgs {
    /// CSV file, optionally gzip compressed
    pub file: PathBuf,

    /// Table name; defaults to the file name up to the first dot
    #[arg(long)]
    pub table: Option<String>,

    /// Target schema
    #[arg(long, default_value = DEFAULT_SCHEMA)]
    pub schema: String,

    /// Field delimiter
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Longest text stored as VARCHAR
    #[arg(long)]
    pub varchar_max_length: Option<usize>,

    /// Only treat values that fully parse as legacy blobs
    #[arg(long)]
    pub strict_legacy: bool,
}

/// Handle the ddl command: print CREATE TABLE for one file
pub fn handle_ddl(args: &DdlArgs) -> Result<(), CliError> {
    let table = match &args.table {
        Some(table) => table.clone(),
        None => table_name_for(&args.file).ok_or_else(|| {
            CliError::InvalidArgument(format!(
                "cannot derive a table name from {}; pass --table",
                args.file.display()
            ))
        })?,
    };

    let options = CsvReadOptions::default().with_delimiter(args.delimiter);
    let batch = read_csv_file(&args.file, &options)?;

    let mut config = ClassifierConfig::default();
    if let Some(max) = args.varchar_max_length {
        config.varchar_max_length = max;
    }
    if args.strict_legacy {
        config.legacy_detection = LegacyDetection::Strict;
    }

    let generator = SchemaGenerator::new(args.schema.clone()).with_classifier(TypeClassifier::with_config(config));
    println!("{}", generator.generate_ddl(&batch, &table, None)?);
    Ok(())
}
