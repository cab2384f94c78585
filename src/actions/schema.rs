//! Schema update step.
//!
//! Applies an ordered list of migrations, statement by statement. The first
//! failing statement aborts the step with context naming the migration.

use super::database::{Connection, ConnectionWork, ConnectedAction};
use crate::action::Payload;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// One named migration: a sequence of statements applied together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    pub id: String,
    pub statements: Vec<String>,
}

impl Migration {
    pub fn new<S: Into<String>>(id: impl Into<String>, statements: impl IntoIterator<Item = S>) -> Self {
        Self {
            id: id.into(),
            statements: statements.into_iter().map(Into::into).collect(),
        }
    }
}

/// Applies migrations in the order given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaUpdate {
    migrations: Vec<Migration>,
}

impl SchemaUpdate {
    pub fn new(migrations: Vec<Migration>) -> Self {
        Self { migrations }
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }
}

impl ConnectionWork for SchemaUpdate {
    fn run(&self, conn: &mut dyn Connection) -> anyhow::Result<Option<Payload>> {
        let mut applied = Vec::with_capacity(self.migrations.len());
        for migration in &self.migrations {
            for (i, statement) in migration.statements.iter().enumerate() {
                conn.execute(statement).with_context(|| {
                    format!("migration {} statement {}", migration.id, i + 1)
                })?;
            }
            info!("Applied migration {}", migration.id);
            applied.push(migration.id.clone());
        }
        Ok(Some(json!({ "applied": applied })))
    }
}

/// A connection-owning action that updates the schema.
pub type SchemaUpdateAction = ConnectedAction<SchemaUpdate>;
