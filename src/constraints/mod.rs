//! Constraint orchestration
//!
//! Declared primary, unique and foreign keys are applied to tables that were
//! loaded without constraints. Orphaned foreign key values are set to NULL
//! first so the foreign key DDL does not fail on dirty data.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tabload::constraints::ConstraintOrchestrator;
//! use tabload::database::{ConnectionConfig, PostgresDatabase};
//!
//! let db = PostgresDatabase::connect(&ConnectionConfig::from_env()?).await?;
//! let mut orchestrator = ConstraintOrchestrator::from_database(db, "staging");
//! orchestrator.load_file("constraints.json".as_ref())?;
//! let report = orchestrator.apply_all(None).await?;
//! orchestrator.close().await?;
//! ```

mod declarations;
mod error;
mod orchestrator;
mod report;
pub mod sql;

pub use declarations::{ConstraintDeclaration, ConstraintSet, ForeignKeyConstraint, KeyConstraint};
pub use error::ConstraintError;
pub use orchestrator::{ConstraintOrchestrator, OrchestratorState, plan_constraints};
pub use report::{
    ConstraintPlan, ConstraintReport, RepairOutcome, RepairPlan, StatementFailure, StatementOutcome,
};
