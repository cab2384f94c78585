//! Seed data step.
//!
//! Inserts rows after the schema exists. Each [`SeedRecord`] renders to one
//! `INSERT` statement; columns come out in sorted order so the generated SQL
//! is stable between runs. String literals are escaped for the dialect of the
//! connection they run on.

use super::database::{Connection, ConnectionWork, ConnectedAction, DatabaseProvider};
use crate::action::Payload;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

/// One row to insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRecord {
    pub table: String,
    pub values: Map<String, Value>,
}

impl SeedRecord {
    pub fn new(table: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            table: table.into(),
            values,
        }
    }

    /// Render the row as an `INSERT` statement for `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is not `table` or `schema.table`, if a
    /// column name is not a plain identifier, if the row has no columns, or
    /// if a value is an array or object.
    pub fn to_insert(&self, provider: DatabaseProvider) -> Result<String> {
        check_identifier(&self.table, 2)?;
        if self.values.is_empty() {
            bail!("seed row for '{}' has no columns", self.table);
        }

        let mut columns = Vec::with_capacity(self.values.len());
        let mut literals = Vec::with_capacity(self.values.len());
        for (column, value) in &self.values {
            check_identifier(column, 1)?;
            columns.push(column.as_str());
            literals.push(
                sql_literal(value, provider)
                    .with_context(|| format!("column {}.{}", self.table, column))?,
            );
        }

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            literals.join(", ")
        ))
    }
}

/// Accepts up to `max_segments` dot-separated parts, each a plain identifier.
fn check_identifier(name: &str, max_segments: usize) -> Result<()> {
    let segments: Vec<&str> = name.split('.').collect();
    let valid = segments.len() <= max_segments
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !segment.starts_with(|c: char| c.is_ascii_digit())
        });
    if !valid {
        bail!("'{}' is not a valid SQL identifier", name);
    }
    Ok(())
}

fn sql_literal(value: &Value, provider: DatabaseProvider) -> Result<String> {
    Ok(match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            let quoted = s.replace('\'', "''");
            match provider {
                // backslash is an escape character in MySQL string literals
                DatabaseProvider::Mysql => format!("'{}'", quoted.replace('\\', "\\\\")),
                _ => format!("'{}'", quoted),
            }
        }
        Value::Array(_) | Value::Object(_) => bail!("nested values cannot be seeded"),
    })
}

/// Inserts seed rows in the order given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedData {
    records: Vec<SeedRecord>,
}

impl SeedData {
    pub fn new(records: Vec<SeedRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SeedRecord] {
        &self.records
    }
}

impl ConnectionWork for SeedData {
    fn run(&self, conn: &mut dyn Connection) -> Result<Option<Payload>> {
        let mut rows = 0u64;
        for (i, record) in self.records.iter().enumerate() {
            let statement = record.to_insert(conn.provider())?;
            debug!("Seeding {} (row {})", record.table, i + 1);
            rows += conn
                .execute(&statement)
                .with_context(|| format!("seed row {} into {}", i + 1, record.table))?;
        }
        Ok(Some(json!({ "rows": rows })))
    }
}

/// A connection-owning action that inserts seed data.
pub type SeedDataAction = ConnectedAction<SeedData>;
