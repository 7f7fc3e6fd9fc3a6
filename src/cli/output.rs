//! Output formatting for CLI

use std::fmt::Write;

use serde::Serialize;

use crate::cli::error::CliError;
use crate::constraints::{ConstraintPlan, ConstraintReport};
use crate::database::StatementOutcome;
use crate::upload::PipelineReport;

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Pretty-printed JSON for any report
pub fn format_json<T: Serialize>(value: &T) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn push_statement(output: &mut String, outcome: &StatementOutcome) {
    match outcome {
        StatementOutcome::Applied { sql, .. } => {
            let _ = writeln!(output, "  ok      {}", sql);
        }
        StatementOutcome::Failed(failure) => {
            let _ = writeln!(output, "  FAILED  {}", failure.sql);
            let _ = writeln!(output, "          {}", failure.message);
        }
    }
}

/// Human readable summary of a constraint run
pub fn format_constraint_report(report: &ConstraintReport) -> String {
    let mut output = String::new();

    output.push_str("Foreign key repair:\n");
    if report.repairs.is_empty() {
        output.push_str("  (no foreign keys)\n");
    }
    for repair in &report.repairs {
        let location = format!("{}.{}.{}", repair.schema, repair.table, repair.column);
        if let Some(err) = &repair.error {
            let _ = writeln!(output, "  FAILED  {}: {}", location, err);
        } else if repair.invalid_values.is_empty() {
            let _ = writeln!(output, "  clean   {}", location);
        } else {
            let _ = writeln!(
                output,
                "  fixed   {}: {} row(s) nulled, invalid values: {}",
                location,
                repair.rows_updated,
                repair.invalid_values.join(",")
            );
        }
    }

    for (title, outcomes) in [
        ("Primary keys", &report.primary_keys),
        ("Unique keys", &report.unique_keys),
        ("Foreign keys", &report.foreign_keys),
    ] {
        let _ = writeln!(output, "{}:", title);
        if outcomes.is_empty() {
            output.push_str("  (none)\n");
        }
        for outcome in outcomes {
            push_statement(&mut output, outcome);
        }
    }

    let failures = report.failures().count();
    if report.is_success() {
        output.push_str("\nAll constraints applied\n");
    } else {
        let _ = writeln!(output, "\n{} constraint statement(s) failed", failures);
    }
    output
}

/// SQL of a dry run, one statement per line
pub fn format_constraint_plan(plan: &ConstraintPlan) -> String {
    let mut output = String::new();
    for statement in plan.statements() {
        output.push_str(statement);
        output.push('\n');
    }
    output
}

/// Human readable summary of a pipeline run
pub fn format_pipeline_report(report: &PipelineReport) -> String {
    let mut output = String::new();

    if !report.schema.is_empty() {
        output.push_str("Schema:\n");
        for outcome in &report.schema {
            push_statement(&mut output, outcome);
        }
    }

    let _ = writeln!(output, "Tables ({}):", report.upload.tables.len());
    for table in &report.upload.tables {
        let status = match (&table.error, table.create.is_applied()) {
            (Some(err), _) => format!("load failed: {}", err),
            (None, false) => "create failed".to_string(),
            (None, true) => format!("{} row(s) loaded", table.rows_loaded.unwrap_or(0)),
        };
        let _ = writeln!(output, "  {:<24} {}", table.table, status);
        if table.normalization.cells_normalized > 0 || table.normalization.cells_failed > 0 {
            let _ = writeln!(
                output,
                "  {:<24} legacy blobs: {} normalized, {} failed",
                "", table.normalization.cells_normalized, table.normalization.cells_failed
            );
        }
    }

    if !report.upload.skipped.is_empty() {
        let _ = writeln!(output, "Skipped ({}):", report.upload.skipped.len());
        for skipped in &report.upload.skipped {
            let _ = writeln!(output, "  {}: {}", skipped.path.display(), skipped.reason);
        }
    }

    if let Some(constraints) = &report.constraints {
        output.push('\n');
        output.push_str(&format_constraint_report(constraints));
    }
    output
}
