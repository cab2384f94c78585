//! Connection-owning action bases.
//!
//! Database steps (schema updates, seed data) share one shape: open a
//! connection from typed configuration, do some work on it, and release it no
//! matter how the work ends. This module provides that shape:
//!
//! - [`DatabaseConfig`]: typed connection settings, validated at construction
//! - [`ConnectionGuard`]: RAII owner that closes its connection on drop
//! - [`ConnectedAction`]: an [`Action`] that opens, runs and releases
//! - [`SharedConnectionAction`]: an [`Action`] borrowing a caller-owned
//!   connection reused across several steps in one run
//!
//! Drivers are external: callers plug one in through [`ConnectionFactory`].

use crate::action::{Action, ActionResult, ActionTitle, Payload};
use crate::error::{InstallError, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString};
use tracing::{debug, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Database engine a connection targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DatabaseProvider {
    #[default]
    Postgres,
    Mysql,
    Sqlite,
    Mssql,
}

/// Typed connection settings for database actions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub provider: DatabaseProvider,
    pub connection_string: String,
    pub database: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl DatabaseConfig {
    pub fn new(
        provider: DatabaseProvider,
        connection_string: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            connection_string: connection_string.into(),
            database: database.into(),
            schema: None,
        }
    }

    /// Check that every required setting is present.
    ///
    /// # Errors
    ///
    /// - `MissingParameter` naming the first absent field
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(InstallError::missing_parameter("connection_string"));
        }
        if self.database.trim().is_empty() {
            return Err(InstallError::missing_parameter("database"));
        }
        if matches!(&self.schema, Some(s) if s.trim().is_empty()) {
            return Err(InstallError::missing_parameter("schema"));
        }
        Ok(())
    }

    /// `provider:database` label for logs; never includes credentials.
    pub fn label(&self) -> String {
        format!("{}:{}", self.provider, self.database)
    }
}

// ============================================================================
// Connections
// ============================================================================

/// An open database connection.
pub trait Connection {
    /// Dialect of the server on the other end.
    fn provider(&self) -> DatabaseProvider;

    /// Run one statement, returning the number of affected rows.
    fn execute(&mut self, statement: &str) -> anyhow::Result<u64>;

    /// Release the underlying handle.
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Opens connections for [`ConnectedAction`]s.
pub trait ConnectionFactory {
    fn open(&self, config: &DatabaseConfig) -> anyhow::Result<Box<dyn Connection>>;
}

/// RAII owner of an open connection.
///
/// The connection is closed exactly once: either explicitly through
/// [`release`](Self::release), which reports close errors, or in `Drop`,
/// which logs them. Drop also runs while unwinding from a panic.
pub struct ConnectionGuard {
    conn: Box<dyn Connection>,
    label: String,
    released: bool,
}

impl ConnectionGuard {
    /// Open a connection through `factory`.
    pub fn open(factory: &dyn ConnectionFactory, config: &DatabaseConfig) -> anyhow::Result<Self> {
        let conn = factory.open(config)?;
        debug!("Opened connection to {}", config.label());
        Ok(Self {
            conn,
            label: config.label(),
            released: false,
        })
    }

    pub fn connection(&mut self) -> &mut dyn Connection {
        self.conn.as_mut()
    }

    /// Close the connection now, surfacing any close error.
    pub fn release(mut self) -> anyhow::Result<()> {
        self.released = true;
        let result = self.conn.close();
        debug!("Released connection to {}", self.label);
        result
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.conn.close() {
            Ok(()) => debug!("Connection to {} closed on drop", self.label),
            Err(e) => warn!("Failed to close connection to {}: {:#}", self.label, e),
        }
    }
}

impl fmt::Debug for ConnectionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("label", &self.label)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Work performed on an open connection.
pub trait ConnectionWork {
    fn run(&self, conn: &mut dyn Connection) -> anyhow::Result<Option<Payload>>;
}

/// An action that owns its connection for the duration of `execute()`.
///
/// The configuration is validated at construction, so a missing setting is
/// reported before any connection is attempted.
pub struct ConnectedAction<W> {
    title: ActionTitle,
    config: DatabaseConfig,
    factory: Arc<dyn ConnectionFactory>,
    work: W,
}

impl<W: ConnectionWork> ConnectedAction<W> {
    /// # Errors
    ///
    /// - `EmptyTitle` if `title` is empty
    /// - `MissingParameter` if `config` lacks a required setting
    pub fn new(
        title: impl Into<String>,
        config: DatabaseConfig,
        factory: Arc<dyn ConnectionFactory>,
        work: W,
    ) -> Result<Self> {
        let title = ActionTitle::new(title)?;
        config.validate()?;
        Ok(Self {
            title,
            config,
            factory,
            work,
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn work(&self) -> &W {
        &self.work
    }
}

impl<W: ConnectionWork> Action for ConnectedAction<W> {
    fn title(&self) -> &str {
        self.title.as_str()
    }

    fn execute(&self) -> ActionResult {
        let title = self.title.as_str();
        let mut guard = ConnectionGuard::open(self.factory.as_ref(), &self.config)
            .map_err(|e| InstallError::action_failed(title, e))?;

        match self.work.run(guard.connection()) {
            Ok(payload) => {
                guard
                    .release()
                    .map_err(|e| InstallError::action_failed(title, e))?;
                Ok(payload)
            }
            // guard drops here and closes the connection
            Err(e) => Err(InstallError::action_failed(title, e)),
        }
    }
}

/// A connection opened by the caller and lent to several actions in one run.
///
/// Execution is serial, so the `RefCell` is never borrowed twice at once.
/// Closing it is the caller's job.
pub type SharedConnection = Rc<RefCell<Box<dyn Connection>>>;

/// Wrap a connection for sharing.
pub fn share(conn: Box<dyn Connection>) -> SharedConnection {
    Rc::new(RefCell::new(conn))
}

/// An action that runs its work on a [`SharedConnection`].
pub struct SharedConnectionAction<W> {
    title: ActionTitle,
    conn: SharedConnection,
    work: W,
}

impl<W: ConnectionWork> SharedConnectionAction<W> {
    pub fn new(title: impl Into<String>, conn: SharedConnection, work: W) -> Result<Self> {
        Ok(Self {
            title: ActionTitle::new(title)?,
            conn,
            work,
        })
    }
}

impl<W: ConnectionWork> Action for SharedConnectionAction<W> {
    fn title(&self) -> &str {
        self.title.as_str()
    }

    fn execute(&self) -> ActionResult {
        let title = self.title.as_str();
        let mut conn = self.conn.try_borrow_mut().map_err(|e| {
            InstallError::action_failed(title, anyhow::anyhow!("shared connection busy: {e}"))
        })?;
        self.work
            .run(&mut **conn)
            .map_err(|e| InstallError::action_failed(title, e))
    }
}
