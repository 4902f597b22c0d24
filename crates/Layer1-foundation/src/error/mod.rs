//! Error types for AgentPod
//!
//! All layers funnel their failures into this enum. Lower layers keep richer
//! error types of their own (e.g. `ProviderError`) and convert at the boundary.

use std::fmt;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Kind of resource a `NotFound` error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Task,
    Execution,
    Agent,
    Configuration,
    OutputFile,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Task => "Task",
            Resource::Execution => "Execution",
            Resource::Agent => "Agent",
            Resource::Configuration => "Configuration",
            Resource::OutputFile => "File",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AgentPod error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Lifecycle
    // ========================================================================
    #[error("{resource} not found: {id}")]
    NotFound { resource: Resource, id: String },

    #[error("Cannot {operation} {id}: current status is {status}")]
    InvalidTransition {
        id: String,
        status: String,
        operation: &'static str,
    },

    // ========================================================================
    // Execution
    // ========================================================================
    #[error("Engine fault: {0}")]
    EngineFault(String),

    #[error("Cancelled by caller")]
    Cancelled,

    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Storage
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // ========================================================================
    // External conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a `NotFound` for the given resource kind
    pub fn not_found(resource: Resource, id: impl ToString) -> Self {
        Error::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Build an `InvalidTransition` naming the refused operation
    pub fn invalid_transition(
        id: impl ToString,
        status: impl ToString,
        operation: &'static str,
    ) -> Self {
        Error::InvalidTransition {
            id: id.to_string(),
            status: status.to_string(),
            operation,
        }
    }

    /// Whether this is a `NotFound` for the given resource kind
    pub fn is_not_found(&self, kind: Resource) -> bool {
        matches!(self, Error::NotFound { resource, .. } if *resource == kind)
    }

    /// Errors that may succeed when the caller tries again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Storage(_))
    }

    /// Errors whose message is safe to show to an API caller
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::InvalidTransition { .. }
                | Error::InvalidInput(_)
                | Error::Config(_)
                | Error::EngineFault(_)
                | Error::Cancelled
        )
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
