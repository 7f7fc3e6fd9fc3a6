//! Shared test helpers: an in-memory database and a log capture layer

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tabload::database::{Database, DatabaseError, Row};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const IDENT: &str = r#""((?:[^"]|"")+)""#;

fn ident_re(pattern: &str) -> Regex {
    Regex::new(&pattern.replace("{ID}", IDENT)).unwrap()
}

static DROP_SCHEMA: Lazy<Regex> = Lazy::new(|| ident_re(r"^DROP SCHEMA IF EXISTS {ID} CASCADE;$"));
static CREATE_SCHEMA: Lazy<Regex> = Lazy::new(|| ident_re(r"^CREATE SCHEMA IF NOT EXISTS {ID};$"));
static DROP_TABLE: Lazy<Regex> = Lazy::new(|| ident_re(r"^DROP TABLE IF EXISTS {ID}\.{ID};$"));
static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| ident_re(r"^CREATE TABLE {ID}\.{ID} \((.*)\);$"));
static COLUMN_DEF: Lazy<Regex> = Lazy::new(|| ident_re(r"{ID} ([A-Z]+)"));
static COPY: Lazy<Regex> = Lazy::new(|| ident_re(r"^COPY {ID}\.{ID} \((.*?)\) FROM STDIN"));
static QUOTED: Lazy<Regex> = Lazy::new(|| ident_re(r"{ID}"));
static ORPHANS: Lazy<Regex> = Lazy::new(|| {
    ident_re(
        r"^SELECT DISTINCT child\.{ID}::text FROM {ID}\.{ID} AS child .* FROM {ID}\.{ID} AS parent WHERE parent\.{ID} = ",
    )
});
static NULLIFY: Lazy<Regex> = Lazy::new(|| ident_re(r"^UPDATE {ID}\.{ID} SET {ID} = NULL WHERE"));
static ADD_KEY: Lazy<Regex> = Lazy::new(|| {
    ident_re(r"^ALTER TABLE {ID}\.{ID} ADD CONSTRAINT {ID} (PRIMARY KEY|UNIQUE) \({ID}\);$")
});
static ADD_FK: Lazy<Regex> = Lazy::new(|| {
    ident_re(r"^ALTER TABLE {ID}\.{ID} ADD CONSTRAINT {ID} FOREIGN KEY \({ID}\) REFERENCES {ID}\.{ID} \({ID}\);$")
});

fn unquote(raw: &str) -> String {
    raw.replace("\"\"", "\"")
}

/// A table held in memory; all cells are text
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    pub columns: Vec<(String, String)>,
    pub rows: Vec<Vec<Option<String>>>,
    /// Columns carrying a primary key or unique constraint
    pub keys: BTreeSet<String>,
    /// Constraint names with their kind
    pub constraints: BTreeMap<String, String>,
}

impl MemoryTable {
    fn index(&self, column: &str) -> Result<usize, DatabaseError> {
        self.columns
            .iter()
            .position(|(name, _)| name == column)
            .ok_or_else(|| DatabaseError::Query(format!("column \"{}\" does not exist", column)))
    }

    /// Values of `column`, `None` for NULL
    pub fn values(&self, column: &str) -> Vec<Option<String>> {
        match self.index(column) {
            Ok(idx) => self.rows.iter().map(|row| row[idx].clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    schemas: BTreeSet<String>,
    tables: BTreeMap<(String, String), MemoryTable>,
    statements: Vec<String>,
    transaction: Option<(BTreeSet<String>, BTreeMap<(String, String), MemoryTable>)>,
    transactions: Vec<&'static str>,
    failures: Vec<String>,
    closed: bool,
}

/// In-memory [`Database`] understanding the statements tabload issues.
///
/// Clones share state so a test can inspect the database after handing a
/// clone to the code under test.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDatabase").finish()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Make every statement containing `fragment` fail
    pub fn fail_when(&self, fragment: &str) {
        self.lock().failures.push(fragment.to_string());
    }

    /// Create a schema with a table of text columns
    pub fn seed(&self, schema: &str, table: &str, columns: &[&str], rows: &[&[Option<&str>]]) {
        let mut state = self.lock();
        state.schemas.insert(schema.to_string());
        state.tables.insert(
            (schema.to_string(), table.to_string()),
            MemoryTable {
                columns: columns.iter().map(|c| (c.to_string(), "TEXT".to_string())).collect(),
                rows: rows
                    .iter()
                    .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
                    .collect(),
                ..Default::default()
            },
        );
    }

    pub fn table(&self, schema: &str, table: &str) -> Option<MemoryTable> {
        self.lock().tables.get(&(schema.to_string(), table.to_string())).cloned()
    }

    pub fn has_schema(&self, schema: &str) -> bool {
        self.lock().schemas.contains(schema)
    }

    /// Every statement received, in order
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// BEGIN / COMMIT / ROLLBACK calls, in order
    pub fn transactions(&self) -> Vec<&'static str> {
        self.lock().transactions.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn start(&self, sql: &str) -> Result<MutexGuard<'_, State>, DatabaseError> {
        let mut state = self.lock();
        if state.closed {
            return Err(DatabaseError::Closed);
        }
        state.statements.push(sql.to_string());
        if state.failures.iter().any(|f| sql.contains(f.as_str())) {
            return Err(DatabaseError::Query("injected failure".to_string()));
        }
        Ok(state)
    }
}

impl State {
    fn table(&self, schema: &str, table: &str) -> Result<&MemoryTable, DatabaseError> {
        self.tables
            .get(&(schema.to_string(), table.to_string()))
            .ok_or_else(|| DatabaseError::Query(format!("relation \"{}.{}\" does not exist", schema, table)))
    }

    fn table_mut(&mut self, schema: &str, table: &str) -> Result<&mut MemoryTable, DatabaseError> {
        self.tables
            .get_mut(&(schema.to_string(), table.to_string()))
            .ok_or_else(|| DatabaseError::Query(format!("relation \"{}.{}\" does not exist", schema, table)))
    }

    fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        if let Some(c) = DROP_SCHEMA.captures(sql) {
            let schema = unquote(&c[1]);
            self.schemas.remove(&schema);
            self.tables.retain(|(s, _), _| *s != schema);
            return Ok(0);
        }
        if let Some(c) = CREATE_SCHEMA.captures(sql) {
            self.schemas.insert(unquote(&c[1]));
            return Ok(0);
        }
        if let Some(c) = DROP_TABLE.captures(sql) {
            self.tables.remove(&(unquote(&c[1]), unquote(&c[2])));
            return Ok(0);
        }
        if let Some(c) = CREATE_TABLE.captures(sql) {
            let key = (unquote(&c[1]), unquote(&c[2]));
            if !self.schemas.contains(&key.0) {
                return Err(DatabaseError::Query(format!("schema \"{}\" does not exist", key.0)));
            }
            if self.tables.contains_key(&key) {
                return Err(DatabaseError::Query(format!("relation \"{}\" already exists", key.1)));
            }
            let columns = COLUMN_DEF
                .captures_iter(&c[3])
                .map(|col| (unquote(&col[1]), col[2].to_string()))
                .collect();
            self.tables.insert(
                key,
                MemoryTable {
                    columns,
                    ..Default::default()
                },
            );
            return Ok(0);
        }
        if let Some(c) = ADD_KEY.captures(sql) {
            let (schema, table, name, kind, column) =
                (unquote(&c[1]), unquote(&c[2]), unquote(&c[3]), c[4].to_string(), unquote(&c[5]));
            let target = self.table_mut(&schema, &table)?;
            if target.constraints.contains_key(&name) {
                return Err(DatabaseError::Query(format!("relation \"{}\" already exists", name)));
            }
            if kind == "PRIMARY KEY" && target.constraints.values().any(|k| k == "PRIMARY KEY") {
                return Err(DatabaseError::Query(format!(
                    "multiple primary keys for table \"{}\" are not allowed",
                    table
                )));
            }
            let values = target.values(&column);
            target.index(&column)?;
            if kind == "PRIMARY KEY" && values.iter().any(Option::is_none) {
                return Err(DatabaseError::Query(format!("column \"{}\" contains null values", column)));
            }
            let mut seen = HashSet::new();
            if values.iter().flatten().any(|v| !seen.insert(v.clone())) {
                return Err(DatabaseError::Query(format!(
                    "could not create unique index \"{}\"",
                    name
                )));
            }
            target.keys.insert(column);
            target.constraints.insert(name, kind);
            return Ok(0);
        }
        if let Some(c) = ADD_FK.captures(sql) {
            let (schema, table, name, column) = (unquote(&c[1]), unquote(&c[2]), unquote(&c[3]), unquote(&c[4]));
            let (ref_schema, ref_table, ref_column) = (unquote(&c[5]), unquote(&c[6]), unquote(&c[7]));

            let parent = self.table(&ref_schema, &ref_table)?;
            parent.index(&ref_column)?;
            if !parent.keys.contains(&ref_column) {
                return Err(DatabaseError::Query(format!(
                    "there is no unique constraint matching given keys for referenced table \"{}\"",
                    ref_table
                )));
            }
            let parent_values: HashSet<String> = parent.values(&ref_column).into_iter().flatten().collect();

            let child = self.table(&schema, &table)?;
            child.index(&column)?;
            if child.constraints.contains_key(&name) {
                return Err(DatabaseError::Query(format!("constraint \"{}\" already exists", name)));
            }
            if let Some(orphan) = child
                .values(&column)
                .into_iter()
                .flatten()
                .find(|v| !parent_values.contains(v))
            {
                return Err(DatabaseError::Query(format!(
                    "insert or update on table \"{}\" violates foreign key constraint \"{}\": key ({})=({}) is not present",
                    table, name, column, orphan
                )));
            }
            self.table_mut(&schema, &table)?
                .constraints
                .insert(name, "FOREIGN KEY".to_string());
            return Ok(0);
        }
        Err(DatabaseError::Query(format!("syntax error: unsupported statement {}", sql)))
    }

    fn orphans(&self, sql: &str) -> Result<Vec<Row>, DatabaseError> {
        let c = ORPHANS
            .captures(sql)
            .ok_or_else(|| DatabaseError::Query(format!("syntax error: unsupported query {}", sql)))?;
        let (column, schema, table) = (unquote(&c[1]), unquote(&c[2]), unquote(&c[3]));
        let (ref_schema, ref_table, ref_column) = (unquote(&c[4]), unquote(&c[5]), unquote(&c[6]));

        let parent = self.table(&ref_schema, &ref_table)?;
        parent.index(&ref_column)?;
        let parent_values: HashSet<String> = parent.values(&ref_column).into_iter().flatten().collect();

        let child = self.table(&schema, &table)?;
        child.index(&column)?;
        let orphans: BTreeSet<String> = child
            .values(&column)
            .into_iter()
            .flatten()
            .filter(|v| !parent_values.contains(v))
            .collect();
        Ok(orphans.into_iter().map(|v| vec![Some(v)]).collect())
    }

    fn nullify(&mut self, sql: &str, values: &[String]) -> Result<u64, DatabaseError> {
        let c = NULLIFY
            .captures(sql)
            .ok_or_else(|| DatabaseError::Query(format!("syntax error: unsupported statement {}", sql)))?;
        let (schema, table, column) = (unquote(&c[1]), unquote(&c[2]), unquote(&c[3]));
        let target = self.table_mut(&schema, &table)?;
        let idx = target.index(&column)?;

        let mut updated = 0;
        for row in &mut target.rows {
            if row[idx].as_ref().is_some_and(|v| values.contains(v)) {
                row[idx] = None;
                updated += 1;
            }
        }
        Ok(updated)
    }

    #[cfg(not(feature = "ingest"))]
    fn copy(&mut self, _sql: &str, _data: &[u8]) -> Result<u64, DatabaseError> {
        Err(DatabaseError::Copy("COPY needs the ingest feature".to_string()))
    }

    #[cfg(feature = "ingest")]
    fn copy(&mut self, sql: &str, data: &[u8]) -> Result<u64, DatabaseError> {
        let c = COPY
            .captures(sql)
            .ok_or_else(|| DatabaseError::Copy(format!("unsupported COPY statement {}", sql)))?;
        let (schema, table) = (unquote(&c[1]), unquote(&c[2]));
        let listed: Vec<String> = QUOTED.captures_iter(&c[3]).map(|q| unquote(&q[1])).collect();

        let target = self.table_mut(&schema, &table)?;
        let indexes = listed
            .iter()
            .map(|column| target.index(column))
            .collect::<Result<Vec<_>, _>>()?;

        let mut reader = csv::Reader::from_reader(data);
        let mut loaded = 0;
        for record in reader.records() {
            let record = record.map_err(|e| DatabaseError::Copy(e.to_string()))?;
            let mut row = vec![None; target.columns.len()];
            for (field, &idx) in record.iter().zip(&indexes) {
                if field.is_empty() {
                    continue;
                }
                let kind = target.columns[idx].1.as_str();
                if matches!(kind, "INTEGER" | "BIGINT") && field.parse::<i64>().is_err() {
                    return Err(DatabaseError::Copy(format!(
                        "invalid input syntax for type {}: \"{}\"",
                        kind.to_lowercase(),
                        field
                    )));
                }
                if kind == "JSONB" && serde_json::from_str::<serde_json::Value>(field).is_err() {
                    return Err(DatabaseError::Copy(format!("invalid input syntax for type json: \"{}\"", field)));
                }
                row[idx] = Some(field.to_string());
            }
            target.rows.push(row);
            loaded += 1;
        }
        Ok(loaded)
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        self.start(sql)?.execute(sql)
    }

    async fn execute_with_text_array(&mut self, sql: &str, values: &[String]) -> Result<u64, DatabaseError> {
        self.start(sql)?.nullify(sql, values)
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DatabaseError> {
        self.start(sql)?.orphans(sql)
    }

    async fn copy_in(&mut self, sql: &str, data: Vec<u8>) -> Result<u64, DatabaseError> {
        self.start(sql)?.copy(sql, &data)
    }

    async fn begin(&mut self) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        state.transactions.push("BEGIN");
        state.transaction = Some((state.schemas.clone(), state.tables.clone()));
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        state.transactions.push("COMMIT");
        state.transaction = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        let mut state = self.lock();
        state.transactions.push("ROLLBACK");
        if let Some((schemas, tables)) = state.transaction.take() {
            state.schemas = schemas;
            state.tables = tables;
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DatabaseError> {
        self.lock().closed = true;
        Ok(())
    }
}

/// One captured log event
#[derive(Debug, Clone)]
pub struct LogLine {
    pub level: Level,
    pub message: String,
}

/// Collects formatted events for assertions
#[derive(Clone, Default)]
pub struct LogCapture {
    lines: Arc<Mutex<Vec<LogLine>>>,
}

impl LogCapture {
    /// Install the capture for the current thread
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::registry().with(capture.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap().clone()
    }

    /// Messages logged at `level`
    pub fn at(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.level == level)
            .map(|l| l.message)
            .collect()
    }

    pub fn contains(&self, level: Level, fragment: &str) -> bool {
        self.at(level).iter().any(|m| m.contains(fragment))
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0.insert_str(0, &format!("{:?}", value));
        } else {
            self.0.push_str(&format!(" {}={:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.lines.lock().unwrap().push(LogLine {
            level: *event.metadata().level(),
            message: visitor.0,
        });
    }
}
