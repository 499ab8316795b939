//! Warehouse targets and write modes.
//!
//! Connections are owned by the caller. [`SqlWarehouse`] renders the
//! statements for a write and hands them to an injected [`SqlExecutor`];
//! [`MemoryWarehouse`] keeps tables in memory for dry runs and tests.

use crate::error::{EtlError, Result};
use crate::utils::{display_any, filter_rows, is_integer_dtype, str_values};
use parking_lot::{Mutex, RwLock};
use pg_escape::quote_identifier;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::{debug, error, info};

/// Fully qualified warehouse table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableTarget {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableTarget {
    pub fn new(database: impl Into<String>, schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// `database.schema.table`, skipping empty parts.
    pub fn qualified_name(&self) -> String {
        [&self.database, &self.schema, &self.table]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| part.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// [`Self::qualified_name`] with each part quoted as a SQL identifier.
    pub fn quoted_name(&self) -> String {
        [&self.database, &self.schema, &self.table]
            .iter()
            .filter(|part| !part.is_empty())
            .map(|part| quote_identifier(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// How a write treats rows already in the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Drop the table and write the new rows.
    Replace,
    /// Insert new keys, update rows whose key already exists.
    Upsert { key: String },
    /// Create the table if needed and insert the rows after any existing ones.
    Append,
}

impl WriteMode {
    pub fn upsert(key: impl Into<String>) -> Self {
        Self::Upsert { key: key.into() }
    }
}

/// A destination for finished tables.
pub trait Warehouse: Send + Sync {
    /// Write `table` to `target`, returning the number of rows written.
    fn write(&self, target: &TableTarget, table: &DataFrame, mode: &WriteMode) -> Result<usize>;
}

/// Runs one SQL statement on a live connection.
pub trait SqlExecutor: Send + Sync {
    fn execute(&self, sql: &str) -> Result<()>;
}

/// Column type used in `CREATE TABLE`.
pub fn sql_type(dtype: &DataType) -> &'static str {
    match dtype {
        d if is_integer_dtype(d) => "BIGINT",
        DataType::Float32 | DataType::Float64 => "DOUBLE",
        DataType::Boolean => "BOOLEAN",
        DataType::Date => "DATE",
        DataType::Datetime(_, _) => "TIMESTAMP",
        _ => "VARCHAR",
    }
}

/// Render one cell as a SQL literal.
pub fn sql_literal(value: &AnyValue) -> String {
    match value {
        AnyValue::Null => "NULL".to_string(),
        AnyValue::Boolean(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        AnyValue::Float64(v) if v.is_finite() => format!("{v:?}"),
        AnyValue::Float32(v) if v.is_finite() => format!("{v:?}"),
        AnyValue::Float64(_) | AnyValue::Float32(_) => "NULL".to_string(),
        v if is_integer_dtype(&v.dtype()) => display_any(v),
        other => format!("'{}'", display_any(other).replace('\'', "''")),
    }
}

fn column_defs(table: &DataFrame) -> Vec<String> {
    table
        .get_columns()
        .iter()
        .map(|c| format!("{} {}", quote_identifier(c.name()), sql_type(c.dtype())))
        .collect()
}

/// `CREATE TABLE` for the columns of `table`.
///
/// With `primary_key` the statement is `IF NOT EXISTS` and declares the key,
/// which the upsert's conflict clause relies on.
pub fn create_table_sql(target: &TableTarget, table: &DataFrame, primary_key: Option<&str>) -> String {
    let mut columns = column_defs(table);
    match primary_key {
        Some(key) => {
            columns.push(format!("PRIMARY KEY ({})", quote_identifier(key)));
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                target.quoted_name(),
                columns.join(", ")
            )
        }
        None => format!("CREATE TABLE {} ({})", target.quoted_name(), columns.join(", ")),
    }
}

/// Multi-row `INSERT`, with an `ON CONFLICT` update when `upsert_key` is set.
pub fn insert_sql(target: &TableTarget, table: &DataFrame, upsert_key: Option<&str>) -> Result<String> {
    let names: Vec<String> = table
        .get_column_names()
        .iter()
        .map(|c| quote_identifier(c).into_owned())
        .collect();

    let mut rows = Vec::with_capacity(table.height());
    for row in 0..table.height() {
        let cells = table
            .get_columns()
            .iter()
            .map(|c| c.get(row).map(|v| sql_literal(&v)))
            .collect::<PolarsResult<Vec<_>>>()?;
        rows.push(format!("({})", cells.join(", ")));
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES {}",
        target.quoted_name(),
        names.join(", "),
        rows.join(", ")
    );

    if let Some(key) = upsert_key {
        let key = quote_identifier(key);
        let updates: Vec<String> = names
            .iter()
            .filter(|n| n.as_str() != key.as_ref())
            .map(|n| format!("{n} = EXCLUDED.{n}"))
            .collect();
        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({key}) DO NOTHING"));
        } else {
            sql.push_str(&format!(" ON CONFLICT ({key}) DO UPDATE SET {}", updates.join(", ")));
        }
    }
    Ok(sql)
}

fn reject_empty(target: &TableTarget, table: &DataFrame) -> Result<()> {
    if table.height() == 0 {
        error!("Refusing to write empty table to {}", target);
        return Err(EtlError::EmptyTable(target.qualified_name()));
    }
    Ok(())
}

fn require_key(target: &TableTarget, table: &DataFrame, key: &str) -> Result<()> {
    if table.column(key).is_err() {
        return Err(EtlError::write_failed(
            target.qualified_name(),
            format!("upsert key '{key}' is not a column"),
        ));
    }
    Ok(())
}

/// Renders writes as SQL and runs them through an executor.
#[derive(Debug)]
pub struct SqlWarehouse<E> {
    executor: E,
}

impl<E: SqlExecutor> SqlWarehouse<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// The statements a write would run, in order.
    pub fn statements(&self, target: &TableTarget, table: &DataFrame, mode: &WriteMode) -> Result<Vec<String>> {
        match mode {
            WriteMode::Replace => Ok(vec![
                format!("DROP TABLE IF EXISTS {}", target.quoted_name()),
                create_table_sql(target, table, None),
                insert_sql(target, table, None)?,
            ]),
            WriteMode::Upsert { key } => {
                require_key(target, table, key)?;
                Ok(vec![
                    create_table_sql(target, table, Some(key)),
                    insert_sql(target, table, Some(key))?,
                ])
            }
            WriteMode::Append => Ok(vec![
                format!(
                    "CREATE TABLE IF NOT EXISTS {} ({})",
                    target.quoted_name(),
                    column_defs(table).join(", ")
                ),
                insert_sql(target, table, None)?,
            ]),
        }
    }
}

impl<E: SqlExecutor> Warehouse for SqlWarehouse<E> {
    fn write(&self, target: &TableTarget, table: &DataFrame, mode: &WriteMode) -> Result<usize> {
        reject_empty(target, table)?;
        info!("Writing {} rows to {} ({:?})", table.height(), target, mode);
        for statement in self.statements(target, table, mode)? {
            debug!("Executing: {:.120}", statement);
            self.executor.execute(&statement).map_err(|e| {
                error!("Error writing to {}: {}", target, e);
                EtlError::write_failed(target.qualified_name(), e)
            })?;
        }
        Ok(table.height())
    }
}

/// Executor that records statements instead of running them.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }
}

impl SqlExecutor for RecordingExecutor {
    fn execute(&self, sql: &str) -> Result<()> {
        self.statements.lock().push(sql.to_string());
        Ok(())
    }
}

/// Tables held in memory, keyed by qualified name.
#[derive(Debug, Default)]
pub struct MemoryWarehouse {
    tables: RwLock<BTreeMap<String, DataFrame>>,
}

static_assertions::assert_impl_all!(MemoryWarehouse: Send, Sync);

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents of a table.
    pub fn table(&self, target: &TableTarget) -> Option<DataFrame> {
        self.tables.read().get(&target.qualified_name()).cloned()
    }

    /// Qualified names of every written table.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }
}

impl Warehouse for MemoryWarehouse {
    fn write(&self, target: &TableTarget, table: &DataFrame, mode: &WriteMode) -> Result<usize> {
        reject_empty(target, table)?;
        let name = target.qualified_name();
        let mut tables = self.tables.write();

        let merged = match (mode, tables.get(&name)) {
            (WriteMode::Upsert { key }, Some(existing)) => {
                require_key(target, table, key)?;
                let incoming: HashSet<Option<String>> = str_values(table, key)?.into_iter().collect();
                let keep: Vec<bool> = str_values(existing, key)?
                    .iter()
                    .map(|k| !incoming.contains(k))
                    .collect();
                let names: Vec<String> = table.get_column_names().iter().map(|c| c.to_string()).collect();
                let mut merged = filter_rows(existing, &keep)?.select(names)?;
                merged
                    .vstack_mut(table)
                    .map_err(|e| EtlError::write_failed(&name, e))?;
                merged
            }
            (WriteMode::Upsert { key }, None) => {
                require_key(target, table, key)?;
                table.clone()
            }
            (WriteMode::Append, Some(existing)) => {
                let names: Vec<String> = existing.get_column_names().iter().map(|c| c.to_string()).collect();
                let incoming = table
                    .select(names)
                    .map_err(|e| EtlError::write_failed(&name, e))?;
                let mut merged = existing.clone();
                merged
                    .vstack_mut(&incoming)
                    .map_err(|e| EtlError::write_failed(&name, e))?;
                merged
            }
            (WriteMode::Replace, _) | (WriteMode::Append, None) => table.clone(),
        };

        info!("Wrote {} rows to {} ({} total)", table.height(), name, merged.height());
        tables.insert(name, merged);
        Ok(table.height())
    }
}
