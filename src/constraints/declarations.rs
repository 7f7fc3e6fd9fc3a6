//! Constraint declarations as read from JSON
//!
//! ```json
//! {
//!   "primary_keys": [{"table_name": "customers", "column_name": "id"}],
//!   "unique_keys":  [{"table_name": "customers", "column_name": "email"}],
//!   "foreign_keys": [{"table_name": "orders", "column_name": "customer_id",
//!                     "reference_table": "customers", "reference_column": "id"}]
//! }
//! ```
//!
//! Every list is optional. Table names may carry a `schema.` qualifier.

use serde::{Deserialize, Serialize};

use crate::validation::{ValidationResult, validate_identifier};

/// A primary key or unique key on one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConstraint {
    pub table_name: String,
    pub column_name: String,
}

/// A foreign key from one column to a column of another table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    pub table_name: String,
    pub column_name: String,
    pub reference_table: String,
    pub reference_column: String,
}

/// The three constraint lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintSet {
    #[serde(default)]
    pub primary_keys: Vec<KeyConstraint>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeyConstraint>,
    #[serde(default)]
    pub unique_keys: Vec<KeyConstraint>,
}

/// A single declared constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConstraintDeclaration {
    PrimaryKey {
        table: String,
        column: String,
    },
    ForeignKey {
        table: String,
        column: String,
        reference_table: String,
        reference_column: String,
    },
    Unique {
        table: String,
        column: String,
    },
}

impl ConstraintDeclaration {
    /// Declared (possibly qualified) table name
    pub fn table(&self) -> &str {
        match self {
            ConstraintDeclaration::PrimaryKey { table, .. }
            | ConstraintDeclaration::ForeignKey { table, .. }
            | ConstraintDeclaration::Unique { table, .. } => table,
        }
    }

    pub fn column(&self) -> &str {
        match self {
            ConstraintDeclaration::PrimaryKey { column, .. }
            | ConstraintDeclaration::ForeignKey { column, .. }
            | ConstraintDeclaration::Unique { column, .. } => column,
        }
    }

    /// Suffix appended to `{table}_{column}` to form the constraint name
    pub fn name_suffix(&self) -> &'static str {
        match self {
            ConstraintDeclaration::PrimaryKey { .. } => "pk",
            ConstraintDeclaration::ForeignKey { .. } => "fk",
            ConstraintDeclaration::Unique { .. } => "unique",
        }
    }

    /// `{table}_{column}_{suffix}`, where `table` is the unqualified table name
    pub fn constraint_name(&self, table: &str) -> String {
        format!("{}_{}_{}", table, self.column(), self.name_suffix())
    }
}

impl ConstraintSet {
    /// Parse declarations from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_empty(&self) -> bool {
        self.primary_keys.is_empty() && self.foreign_keys.is_empty() && self.unique_keys.is_empty()
    }

    /// Total number of declarations
    pub fn len(&self) -> usize {
        self.primary_keys.len() + self.foreign_keys.len() + self.unique_keys.len()
    }

    /// All declarations in application order: primary, unique, foreign
    pub fn declarations(&self) -> Vec<ConstraintDeclaration> {
        let primary = self.primary_keys.iter().map(|c| ConstraintDeclaration::PrimaryKey {
            table: c.table_name.clone(),
            column: c.column_name.clone(),
        });
        let unique = self.unique_keys.iter().map(|c| ConstraintDeclaration::Unique {
            table: c.table_name.clone(),
            column: c.column_name.clone(),
        });
        let foreign = self.foreign_keys.iter().map(|c| ConstraintDeclaration::ForeignKey {
            table: c.table_name.clone(),
            column: c.column_name.clone(),
            reference_table: c.reference_table.clone(),
            reference_column: c.reference_column.clone(),
        });
        primary.chain(unique).chain(foreign).collect()
    }

    /// Check every table and column name can be quoted safely
    pub fn validate(&self) -> ValidationResult<()> {
        for key in self.primary_keys.iter().chain(&self.unique_keys) {
            validate_table_name(&key.table_name)?;
            validate_identifier(&key.column_name, "column name")?;
        }
        for fk in &self.foreign_keys {
            validate_table_name(&fk.table_name)?;
            validate_identifier(&fk.column_name, "column name")?;
            validate_table_name(&fk.reference_table)?;
            validate_identifier(&fk.reference_column, "column name")?;
        }
        Ok(())
    }
}

fn validate_table_name(name: &str) -> ValidationResult<()> {
    match name.split_once('.') {
        Some((schema, table)) => {
            validate_identifier(schema, "schema name")?;
            validate_identifier(table, "table name")
        }
        None => validate_identifier(name, "table name"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_default_to_empty() {
        let set = ConstraintSet::from_json(r#"{"primary_keys":[{"table_name":"t","column_name":"id"}]}"#).unwrap();
        assert_eq!(set.primary_keys.len(), 1);
        assert!(set.foreign_keys.is_empty());
        assert!(set.unique_keys.is_empty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_foreign_key_requires_reference() {
        let result = ConstraintSet::from_json(r#"{"foreign_keys":[{"table_name":"t","column_name":"c"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_declarations_are_in_application_order() {
        let set = ConstraintSet::from_json(
            r#"{
                "foreign_keys": [{"table_name":"o","column_name":"c","reference_table":"c","reference_column":"id"}],
                "unique_keys": [{"table_name":"c","column_name":"email"}],
                "primary_keys": [{"table_name":"c","column_name":"id"}]
            }"#,
        )
        .unwrap();
        let suffixes: Vec<_> = set.declarations().iter().map(|d| d.name_suffix()).collect();
        assert_eq!(suffixes, vec!["pk", "unique", "fk"]);
    }

    #[test]
    fn test_constraint_name_uses_unqualified_table() {
        let declaration = ConstraintDeclaration::ForeignKey {
            table: "sales.orders".to_string(),
            column: "customer_id".to_string(),
            reference_table: "customers".to_string(),
            reference_column: "id".to_string(),
        };
        assert_eq!(declaration.column(), "customer_id");
        assert_eq!(declaration.constraint_name("orders"), "orders_customer_id_fk");
    }

    #[test]
    fn test_validate_rejects_unsafe_names() {
        let set = ConstraintSet {
            unique_keys: vec![KeyConstraint {
                table_name: "sales.ord\"ers".to_string(),
                column_name: "id".to_string(),
            }],
            ..Default::default()
        };
        assert!(set.validate().is_err());

        let ok = ConstraintSet {
            primary_keys: vec![KeyConstraint {
                table_name: "sales.orders".to_string(),
                column_name: "order id".to_string(),
            }],
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }
}
