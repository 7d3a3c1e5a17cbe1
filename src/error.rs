//! Error types for planner
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task or category, invalid config)
//! - 3: Blocked (the task is not in a state that allows the transition)
//! - 4: Operation failed (I/O, corrupt data, lock contention)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the planner CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for planner operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Category not found: {0}")]
    CategoryNotFound(String),

    #[error("Category already exists: {0}")]
    DuplicateCategory(String),

    #[error("Journal entry not found: {0}")]
    EntryNotFound(String),

    // State machine blocks (exit code 3)
    #[error("Transition not allowed for task {task}: {reason}")]
    TransitionBlocked { task: String, reason: String },

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::TaskNotFound(_)
            | Error::CategoryNotFound(_)
            | Error::DuplicateCategory(_)
            | Error::EntryNotFound(_) => exit_codes::USER_ERROR,

            // State machine blocks
            Error::TransitionBlocked { .. } => exit_codes::BLOCKED,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details attached to JSON error envelopes
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TransitionBlocked { task, reason } => Some(serde_json::json!({
                "task": task,
                "reason": reason,
            })),
            Error::LockFailed(path) => Some(serde_json::json!({
                "lock": path.to_string_lossy(),
            })),
            _ => None,
        }
    }

    pub(crate) fn blocked(task: &str, reason: impl Into<String>) -> Self {
        Error::TransitionBlocked {
            task: task.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for planner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
