//! Constraints command implementation

use crate::cli::error::CliError;
use crate::cli::output::{OutputFormat, format_constraint_plan, format_constraint_report, format_json};
use crate::constraints::{ConstraintOrchestrator, ConstraintSet, plan_constraints};
use crate::database::{ConnectionConfig, PostgresDatabase, SchemaHandle};
use crate::schema::DEFAULT_SCHEMA;

use super::{ConnectionArgs, load_input};

#[derive(clap::Args, Debug)]
pub struct ConstraintsArgs {
    /// JSON file with constraint declarations, or `-` for stdin
    pub file: String,

    /// Schema for unqualified table names
    #[arg(long, default_value = DEFAULT_SCHEMA)]
    pub schema: String,

    /// Print the SQL without connecting
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Handle the constraints command
pub async fn handle_constraints(args: &ConstraintsArgs) -> Result<(), CliError> {
    let json = load_input(&args.file)?;
    let constraints = ConstraintSet::from_json(&json)
        .map_err(|e| CliError::InvalidArgument(format!("invalid constraint file {}: {}", args.file, e)))?;
    constraints
        .validate()
        .map_err(|e| CliError::InvalidArgument(e.to_string()))?;

    if args.dry_run {
        let plan = plan_constraints(&constraints, &args.schema, None)?;
        match args.format {
            OutputFormat::Json => println!("{}", format_json(&plan)?),
            OutputFormat::Text => print!("{}", format_constraint_plan(&plan)),
        }
        return Ok(());
    }

    let config = args.connection.apply(ConnectionConfig::default());
    let database = PostgresDatabase::connect(&config).await?;
    let mut orchestrator = ConstraintOrchestrator::new(SchemaHandle::new(database, args.schema.clone()));
    orchestrator.load(constraints)?;
    let report = orchestrator.apply_all(None).await;
    orchestrator.close().await?;
    let report = report?;

    match args.format {
        OutputFormat::Json => println!("{}", format_json(&report)?),
        OutputFormat::Text => print!("{}", format_constraint_report(&report)),
    }

    let failures = report.failures().count();
    if failures > 0 {
        return Err(CliError::ConstraintFailures(failures));
    }
    Ok(())
}
