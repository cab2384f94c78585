//! Concrete actions.
//!
//! Each submodule provides a ready-made [`Action`](crate::action::Action)
//! implementation:
//!
//! - `database`: connection-owning bases and typed connection settings
//! - `schema`: ordered migrations on an owned connection
//! - `seed`: seed rows on an owned connection
//! - `script`: external commands with typed arguments

pub mod database;
pub mod schema;
pub mod script;
pub mod seed;

pub use database::{
    share, Connection, ConnectionFactory, ConnectionGuard, ConnectionWork, ConnectedAction,
    DatabaseConfig, DatabaseProvider, SharedConnection, SharedConnectionAction,
};
pub use schema::{Migration, SchemaUpdate, SchemaUpdateAction};
pub use script::{run_script, CommandSpec, ScriptAction, ScriptArgs, ScriptOutput};
pub use seed::{SeedData, SeedDataAction, SeedRecord};
