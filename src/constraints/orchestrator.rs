//! Ordered application of declared constraints
//!
//! Foreign keys only succeed when every referencing value exists in the
//! referenced column, and only after the referenced column is a primary or
//! unique key. The orchestrator therefore runs four phases in a fixed order:
//!
//! 1. repair: set orphaned foreign key values to NULL
//! 2. primary keys
//! 3. unique keys
//! 4. foreign keys
//!
//! Each phase is a separate call so callers can inspect the database in
//! between; [`ConstraintOrchestrator::apply_all`] runs them back to back.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::{Instrument, Span, error, info, warn};

use crate::database::{Database, DatabaseError, SchemaHandle, StatementOutcome, split_schema_table};

use super::declarations::{ConstraintDeclaration, ConstraintSet};
use super::error::ConstraintError;
use super::report::{ConstraintPlan, ConstraintReport, RepairOutcome, RepairPlan};
use super::sql;

/// Progress through the constraint phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Uninitialized,
    Loaded,
    Repaired,
    PrimaryKeysApplied,
    UniqueKeysApplied,
    ForeignKeysApplied,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrchestratorState::Uninitialized => "uninitialized",
            OrchestratorState::Loaded => "loaded",
            OrchestratorState::Repaired => "repaired",
            OrchestratorState::PrimaryKeysApplied => "primary keys applied",
            OrchestratorState::UniqueKeysApplied => "unique keys applied",
            OrchestratorState::ForeignKeysApplied => "foreign keys applied",
        };
        f.write_str(name)
    }
}

/// Applies primary, unique and foreign key constraints to loaded tables
pub struct ConstraintOrchestrator<D: Database> {
    handle: SchemaHandle<D>,
    constraints: Option<ConstraintSet>,
    state: OrchestratorState,
}

impl<D: Database> ConstraintOrchestrator<D> {
    pub fn new(handle: SchemaHandle<D>) -> Self {
        Self {
            handle,
            constraints: None,
            state: OrchestratorState::Uninitialized,
        }
    }

    /// Wrap a database connection with `default_schema`
    pub fn from_database(database: D, default_schema: impl Into<String>) -> Self {
        Self::new(SchemaHandle::new(database, default_schema))
    }

    /// Set the span events are recorded in
    pub fn with_span(mut self, span: Span) -> Self {
        self.handle = self.handle.with_span(span);
        self
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Loaded declarations, if any
    pub fn constraints(&self) -> Option<&ConstraintSet> {
        self.constraints.as_ref()
    }

    pub fn handle(&self) -> &SchemaHandle<D> {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut SchemaHandle<D> {
        &mut self.handle
    }

    /// Give back the schema handle
    pub fn into_handle(self) -> SchemaHandle<D> {
        self.handle
    }

    fn span(&self) -> Span {
        self.handle.span().clone()
    }

    /// Load declarations.
    ///
    /// Allowed before any phase has run; loading again replaces the previous
    /// set. Invalid identifiers are rejected and leave the state unchanged.
    pub fn load(&mut self, constraints: ConstraintSet) -> Result<(), ConstraintError> {
        let _guard = self.handle.span().enter();
        if self.state > OrchestratorState::Loaded {
            return Err(ConstraintError::OutOfOrder {
                operation: "load constraints",
                state: self.state,
            });
        }
        if let Err(e) = constraints.validate() {
            error!("Rejected constraint declarations: {}", e);
            return Err(ConstraintError::Declarations(e.to_string()));
        }
        info!(
            primary_keys = constraints.primary_keys.len(),
            unique_keys = constraints.unique_keys.len(),
            foreign_keys = constraints.foreign_keys.len(),
            "Constraints loaded"
        );
        self.constraints = Some(constraints);
        self.state = OrchestratorState::Loaded;
        Ok(())
    }

    /// Load declarations from a JSON document
    pub fn load_json(&mut self, json: &str) -> Result<(), ConstraintError> {
        match ConstraintSet::from_json(json) {
            Ok(constraints) => self.load(constraints),
            Err(e) => {
                self.handle
                    .span()
                    .in_scope(|| error!("Cannot parse constraint declarations: {}", e));
                Err(ConstraintError::Declarations(e.to_string()))
            }
        }
    }

    /// Load declarations from a JSON file
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConstraintError> {
        let json = std::fs::read_to_string(path).map_err(|source| {
            self.handle
                .span()
                .in_scope(|| error!("Cannot read constraint file {}: {}", path.display(), source));
            ConstraintError::Io {
                path: path.to_path_buf(),
                source,
            }
        })?;
        self.load_json(&json)
    }

    /// Build every statement [`apply_all`](Self::apply_all) would run.
    ///
    /// Does not touch the database.
    pub fn plan(&self, schema: Option<&str>) -> Result<ConstraintPlan, ConstraintError> {
        let constraints = self.constraints.as_ref().ok_or(ConstraintError::NotLoaded)?;
        plan_constraints(constraints, self.handle.default_schema(), schema)
    }

    /// Check the state allows `operation`; `allowed` lists accepted states
    fn require(&self, operation: &'static str, allowed: &[OrchestratorState]) -> Result<(), ConstraintError> {
        if self.state == OrchestratorState::Uninitialized {
            self.handle
                .span()
                .in_scope(|| error!("Cannot {}: constraints have not been loaded", operation));
            return Err(ConstraintError::NotLoaded);
        }
        if !allowed.contains(&self.state) {
            return Err(ConstraintError::OutOfOrder {
                operation,
                state: self.state,
            });
        }
        if self.handle.is_closed() {
            return Err(ConstraintError::Database(DatabaseError::Closed));
        }
        Ok(())
    }

    /// Null out foreign key values with no match in the referenced column.
    ///
    /// Each foreign key is repaired in its own transaction; a failure rolls
    /// back that foreign key only. Running it again finds nothing to repair.
    pub async fn repair_foreign_keys(&mut self, schema: Option<&str>) -> Result<Vec<RepairOutcome>, ConstraintError> {
        use OrchestratorState::*;
        self.require(
            "repair foreign keys",
            &[Loaded, Repaired, PrimaryKeysApplied, UniqueKeysApplied, ForeignKeysApplied],
        )?;
        let plan = self.plan(schema)?;

        let span = self.span();
        let outcomes = self.run_repairs(plan.repairs).instrument(span).await;
        if self.state == Loaded {
            self.state = Repaired;
        }
        Ok(outcomes)
    }

    /// Add the declared primary keys
    pub async fn apply_primary_keys(&mut self, schema: Option<&str>) -> Result<Vec<StatementOutcome>, ConstraintError> {
        self.require("apply primary keys", &[OrchestratorState::Repaired])?;
        let statements = self.plan(schema)?.primary_keys;
        let outcomes = self.run_statements(&statements, "Primary keys").await;
        self.state = OrchestratorState::PrimaryKeysApplied;
        Ok(outcomes)
    }

    /// Add the declared unique keys
    pub async fn apply_unique_keys(&mut self, schema: Option<&str>) -> Result<Vec<StatementOutcome>, ConstraintError> {
        self.require("apply unique keys", &[OrchestratorState::PrimaryKeysApplied])?;
        let statements = self.plan(schema)?.unique_keys;
        let outcomes = self.run_statements(&statements, "Unique keys").await;
        self.state = OrchestratorState::UniqueKeysApplied;
        Ok(outcomes)
    }

    /// Add the declared foreign keys
    pub async fn apply_foreign_keys(&mut self, schema: Option<&str>) -> Result<Vec<StatementOutcome>, ConstraintError> {
        self.require("apply foreign keys", &[OrchestratorState::UniqueKeysApplied])?;
        let statements = self.plan(schema)?.foreign_keys;
        let outcomes = self.run_statements(&statements, "Foreign keys").await;
        self.state = OrchestratorState::ForeignKeysApplied;
        Ok(outcomes)
    }

    /// Repair, then apply primary, unique and foreign keys.
    ///
    /// Statement failures are recorded in the report and never stop the
    /// remaining statements.
    pub async fn apply_all(&mut self, schema: Option<&str>) -> Result<ConstraintReport, ConstraintError> {
        self.require(
            "apply constraints",
            &[OrchestratorState::Loaded, OrchestratorState::Repaired],
        )?;

        let repairs = self.repair_foreign_keys(schema).await?;
        let primary_keys = self.apply_primary_keys(schema).await?;
        let unique_keys = self.apply_unique_keys(schema).await?;
        let foreign_keys = self.apply_foreign_keys(schema).await?;

        let report = ConstraintReport {
            repairs,
            primary_keys,
            unique_keys,
            foreign_keys,
        };
        self.handle.span().in_scope(|| {
            info!(
                rows_repaired = report.rows_repaired(),
                failures = report.failures().count(),
                "Constraints applied"
            );
        });
        Ok(report)
    }

    /// Close the underlying connection
    pub async fn close(&mut self) -> Result<(), ConstraintError> {
        Ok(self.handle.close().await?)
    }

    async fn run_statements(&mut self, statements: &[String], phase: &str) -> Vec<StatementOutcome> {
        let mut outcomes = Vec::with_capacity(statements.len());
        for statement in statements {
            outcomes.push(self.handle.execute_statement(statement).await);
        }
        let failed = outcomes.iter().filter(|o| !o.is_applied()).count();
        self.handle.span().in_scope(|| {
            if failed == 0 {
                info!("{} created ({} statements)", phase, outcomes.len());
            } else {
                warn!("{} created with {} of {} statements failing", phase, failed, outcomes.len());
            }
        });
        outcomes
    }

    async fn run_repairs(&mut self, repairs: Vec<RepairPlan>) -> Vec<RepairOutcome> {
        let mut outcomes = Vec::with_capacity(repairs.len());
        for repair in repairs {
            let location = format!("{}.{}.{}", repair.schema, repair.table, repair.column);
            let mut outcome = RepairOutcome {
                schema: repair.schema,
                table: repair.table,
                column: repair.column,
                invalid_values: Vec::new(),
                rows_updated: 0,
                error: None,
            };

            let db = match self.handle.database() {
                Ok(db) => db,
                Err(e) => {
                    error!("Failed to repair foreign keys in {}: {}", location, e);
                    outcome.error = Some(e.to_string());
                    outcomes.push(outcome);
                    continue;
                }
            };

            match repair_one(db, &location, &repair.orphan_query, &repair.nullify_statement).await {
                Ok((invalid_values, rows_updated)) => {
                    if invalid_values.is_empty() {
                        info!("No invalid foreign keys found in {}", location);
                    } else {
                        info!("Invalid foreign keys in {} set to NULL ({} rows)", location, rows_updated);
                    }
                    outcome.invalid_values = invalid_values;
                    outcome.rows_updated = rows_updated;
                }
                Err(e) => {
                    error!("Failed to repair foreign keys in {}: {}", location, e);
                    if let Err(rollback) = db.rollback().await {
                        error!("Rollback failed for {}: {}", location, rollback);
                    }
                    outcome.error = Some(e.to_string());
                }
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Statements for `constraints` without an orchestrator or a connection.
///
/// Table names resolve as in [`split_schema_table`]: `schema`, then
/// the qualifier, then `default_schema`.
pub fn plan_constraints(
    constraints: &ConstraintSet,
    default_schema: &str,
    schema: Option<&str>,
) -> Result<ConstraintPlan, ConstraintError> {
    let mut plan = ConstraintPlan::default();
    for fk in &constraints.foreign_keys {
        let (s, t) = split_schema_table(&fk.table_name, schema, default_schema);
        let (rs, rt) = split_schema_table(&fk.reference_table, schema, default_schema);
        plan.repairs.push(RepairPlan {
            schema: s.to_string(),
            table: t.to_string(),
            column: fk.column_name.clone(),
            orphan_query: sql::orphan_values_sql(s, t, &fk.column_name, rs, rt, &fk.reference_column)?,
            nullify_statement: sql::nullify_values_sql(s, t, &fk.column_name)?,
        });
    }
    for declaration in constraints.declarations() {
        let (s, t) = split_schema_table(declaration.table(), schema, default_schema);
        let name = declaration.constraint_name(t);
        match &declaration {
            ConstraintDeclaration::PrimaryKey { column, .. } => {
                plan.primary_keys.push(sql::primary_key_sql(s, t, &name, column)?);
            }
            ConstraintDeclaration::Unique { column, .. } => {
                plan.unique_keys.push(sql::unique_key_sql(s, t, &name, column)?);
            }
            ConstraintDeclaration::ForeignKey {
                column,
                reference_table,
                reference_column,
                ..
            } => {
                let (rs, rt) = split_schema_table(reference_table, schema, default_schema);
                plan.foreign_keys
                    .push(sql::foreign_key_sql(s, t, &name, column, rs, rt, reference_column)?);
            }
        }
    }
    Ok(plan)
}

/// One transaction: find orphans, log them, null them, commit.
async fn repair_one<D: Database>(
    db: &mut D,
    location: &str,
    orphan_query: &str,
    nullify_statement: &str,
) -> Result<(Vec<String>, u64), DatabaseError> {
    db.begin().await?;
    let rows = db.query(orphan_query).await?;
    let invalid_values: Vec<String> = rows
        .into_iter()
        .filter_map(|row| row.into_iter().next().flatten())
        .collect();

    let mut rows_updated = 0;
    if !invalid_values.is_empty() {
        warn!(
            "Invalid foreign keys found in {}: {}",
            location,
            invalid_values.join(",")
        );
        rows_updated = db.execute_with_text_array(nullify_statement, &invalid_values).await?;
    }
    db.commit().await?;
    Ok((invalid_values, rows_updated))
}

impl<D: Database + fmt::Debug> fmt::Debug for ConstraintOrchestrator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintOrchestrator")
            .field("handle", &self.handle)
            .field("state", &self.state)
            .finish()
    }
}
