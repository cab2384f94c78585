//! Error handling module for installkit
//!
//! Provides the single error type shared by every layer of the orchestrator.
//! Actions, groups and plans all return the same `Result` shape so a failure
//! can travel from the failing action to the caller of `Plan::install`
//! without being wrapped or rewritten.

use thiserror::Error;

/// Main error type for installkit
#[derive(Error, Debug)]
pub enum InstallError {
    /// An action was constructed with an empty or whitespace-only title
    #[error("Action title must not be empty")]
    EmptyTitle,

    /// A required configuration value was absent at construction time
    #[error("Missing required parameter: {name}")]
    MissingParameter { name: String },

    /// Two entries were registered under the same priority in one scope
    #[error("Duplicate priority {priority} in {scope}")]
    DuplicatePriority { scope: String, priority: i32 },

    /// The requested capability is deliberately not provided
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// An action ran and reported an operational failure
    #[error("Action '{title}' failed: {source:#}")]
    ActionFailed {
        title: String,
        #[source]
        source: anyhow::Error,
    },

    /// An action panicked; the panic was caught at the group boundary
    #[error("Action '{title}' panicked: {message}")]
    ActionPanicked { title: String, message: String },

    /// IO errors (plan files, script spawning)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for installkit operations
pub type Result<T> = std::result::Result<T, InstallError>;

// Convenient error constructors
impl InstallError {
    /// Create a missing-parameter contract violation
    pub fn missing_parameter(name: impl Into<String>) -> Self {
        Self::MissingParameter { name: name.into() }
    }

    /// Create a duplicate-priority contract violation
    pub fn duplicate_priority(scope: impl Into<String>, priority: i32) -> Self {
        Self::DuplicatePriority {
            scope: scope.into(),
            priority,
        }
    }

    /// Create an unsupported-operation error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedOperation(msg.into())
    }

    /// Create an execution failure for the named action
    pub fn action_failed(title: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::ActionFailed {
            title: title.into(),
            source: source.into(),
        }
    }

    /// Returns true for programmer errors raised before any work starts
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::EmptyTitle | Self::MissingParameter { .. } | Self::DuplicatePriority { .. }
        )
    }

    /// Returns true for failures produced while an action was doing its work
    pub fn is_execution_failure(&self) -> bool {
        matches!(self, Self::ActionFailed { .. } | Self::ActionPanicked { .. })
    }

    /// Title of the action that produced this failure, if any
    pub fn action_title(&self) -> Option<&str> {
        match self {
            Self::ActionFailed { title, .. } | Self::ActionPanicked { title, .. } => Some(title),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = InstallError::missing_parameter("connection_string");
        assert_eq!(
            err.to_string(),
            "Missing required parameter: connection_string"
        );

        let err = InstallError::duplicate_priority("group 'schema'", 3);
        assert_eq!(err.to_string(), "Duplicate priority 3 in group 'schema'");
    }

    #[test]
    fn test_action_failed_keeps_cause_chain() {
        let cause = anyhow::anyhow!("relation already exists").context("migration 0002");
        let err = InstallError::action_failed("Update schema", cause);
        let msg = err.to_string();
        assert!(msg.contains("Update schema"));
        assert!(msg.contains("migration 0002"));
        assert!(msg.contains("relation already exists"));
        assert_eq!(err.action_title(), Some("Update schema"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: InstallError = io_err.into();
        assert!(matches!(err, InstallError::Io(_)));
    }

    #[test]
    fn test_error_classification() {
        assert!(InstallError::EmptyTitle.is_contract_violation());
        assert!(InstallError::missing_parameter("x").is_contract_violation());
        assert!(!InstallError::unsupported("async").is_contract_violation());
        assert!(!InstallError::unsupported("async").is_execution_failure());

        let panicked = InstallError::ActionPanicked {
            title: "Seed".into(),
            message: "boom".into(),
        };
        assert!(panicked.is_execution_failure());
        assert_eq!(panicked.action_title(), Some("Seed"));
    }
}
