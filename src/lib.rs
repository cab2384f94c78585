//! installkit library
//!
//! Ordered, halt-on-failure installer orchestration:
//! actions run inside priority-ordered groups, groups run inside a
//! priority-ordered plan, and progress is reported per group and per plan.

pub mod action;
pub mod action_group;
pub mod actions;
pub mod cli;
pub mod error;
pub mod plan;
pub mod plan_file;

// Re-export main types for convenience
pub use action::{Action, ActionResult, ActionTitle, FnAction, Payload, run_guarded, with_panics_logged};
pub use action_group::{ActionGroup, GroupReporter};
pub use error::{InstallError, Result};
pub use plan::{Plan, PlanBuilder, ProgressFn, TitleFn};
pub use plan_file::{GroupSpec, PlanFile, StepSpec};

// Concrete actions
pub use actions::{
    CommandSpec, ConnectedAction, Connection, ConnectionFactory, ConnectionGuard, ConnectionWork,
    DatabaseConfig, DatabaseProvider, Migration, SchemaUpdate, SchemaUpdateAction, ScriptAction,
    ScriptArgs, ScriptOutput, SeedData, SeedDataAction, SeedRecord, SharedConnection,
    SharedConnectionAction,
};
