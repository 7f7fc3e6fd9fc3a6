//! SQL builders for constraint DDL and foreign key repair

use crate::schema::SchemaError;
use crate::validation::{quote_identifier, quote_qualified};

/// `ALTER TABLE "s"."t" ADD CONSTRAINT "name" PRIMARY KEY ("c");`
pub fn primary_key_sql(schema: &str, table: &str, name: &str, column: &str) -> Result<String, SchemaError> {
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({});",
        quote_qualified(schema, table)?,
        quote_identifier(name, "constraint name")?,
        quote_identifier(column, "column name")?
    ))
}

/// `ALTER TABLE "s"."t" ADD CONSTRAINT "name" UNIQUE ("c");`
pub fn unique_key_sql(schema: &str, table: &str, name: &str, column: &str) -> Result<String, SchemaError> {
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({});",
        quote_qualified(schema, table)?,
        quote_identifier(name, "constraint name")?,
        quote_identifier(column, "column name")?
    ))
}

/// `ALTER TABLE "s"."t" ADD CONSTRAINT "name" FOREIGN KEY ("c") REFERENCES "rs"."rt" ("rc");`
pub fn foreign_key_sql(
    schema: &str,
    table: &str,
    name: &str,
    column: &str,
    reference_schema: &str,
    reference_table: &str,
    reference_column: &str,
) -> Result<String, SchemaError> {
    Ok(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({});",
        quote_qualified(schema, table)?,
        quote_identifier(name, "constraint name")?,
        quote_identifier(column, "column name")?,
        quote_qualified(reference_schema, reference_table)?,
        quote_identifier(reference_column, "column name")?
    ))
}

/// Distinct non-null values of the referencing column that have no match in
/// the referenced column, as text. NULLs in the referenced column do not hide
/// orphans.
pub fn orphan_values_sql(
    schema: &str,
    table: &str,
    column: &str,
    reference_schema: &str,
    reference_table: &str,
    reference_column: &str,
) -> Result<String, SchemaError> {
    let column = quote_identifier(column, "column name")?;
    let reference_column = quote_identifier(reference_column, "column name")?;
    Ok(format!(
        "SELECT DISTINCT child.{col}::text FROM {table} AS child \
         WHERE child.{col} IS NOT NULL \
         AND NOT EXISTS (SELECT 1 FROM {ref_table} AS parent WHERE parent.{ref_col} = child.{col}) \
         ORDER BY 1;",
        col = column,
        table = quote_qualified(schema, table)?,
        ref_table = quote_qualified(reference_schema, reference_table)?,
        ref_col = reference_column,
    ))
}

/// `UPDATE "s"."t" SET "c" = NULL WHERE "c"::text = ANY($1);`
///
/// `$1` is bound to a `text[]` of the values to clear.
pub fn nullify_values_sql(schema: &str, table: &str, column: &str) -> Result<String, SchemaError> {
    let column = quote_identifier(column, "column name")?;
    Ok(format!(
        "UPDATE {} SET {col} = NULL WHERE {col}::text = ANY($1);",
        quote_qualified(schema, table)?,
        col = column
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_statements() {
        assert_eq!(
            primary_key_sql("public", "customers", "customers_id_pk", "id").unwrap(),
            r#"ALTER TABLE "public"."customers" ADD CONSTRAINT "customers_id_pk" PRIMARY KEY ("id");"#
        );
        assert_eq!(
            unique_key_sql("public", "customers", "customers_email_unique", "email").unwrap(),
            r#"ALTER TABLE "public"."customers" ADD CONSTRAINT "customers_email_unique" UNIQUE ("email");"#
        );
        assert_eq!(
            foreign_key_sql("public", "orders", "orders_customer_id_fk", "customer_id", "crm", "customers", "id").unwrap(),
            r#"ALTER TABLE "public"."orders" ADD CONSTRAINT "orders_customer_id_fk" FOREIGN KEY ("customer_id") REFERENCES "crm"."customers" ("id");"#
        );
    }

    #[test]
    fn test_repair_statements() {
        assert_eq!(
            orphan_values_sql("s", "orders", "customer_id", "s", "customers", "id").unwrap(),
            r#"SELECT DISTINCT child."customer_id"::text FROM "s"."orders" AS child WHERE child."customer_id" IS NOT NULL AND NOT EXISTS (SELECT 1 FROM "s"."customers" AS parent WHERE parent."id" = child."customer_id") ORDER BY 1;"#
        );
        assert_eq!(
            nullify_values_sql("s", "orders", "customer_id").unwrap(),
            r#"UPDATE "s"."orders" SET "customer_id" = NULL WHERE "customer_id"::text = ANY($1);"#
        );
    }
}
