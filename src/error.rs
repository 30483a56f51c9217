//! Error types for tasksmith
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, invalid config)
//! - 3: Blocked by policy (dependency cycle, illegal status transition)
//! - 4: Operation failed (persistence, executor, IO)

use std::path::PathBuf;
use thiserror::Error;

use crate::task::TaskStatus;

/// Exit codes for the tasksmith CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for tasksmith operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    // Policy blocks (exit code 3)
    #[error("Task {0} depends on itself")]
    SelfDependency(String),

    #[error("Dependency cycle detected between tasks: {}", .members.join(", "))]
    CycleDetected { members: Vec<String> },

    #[error("Illegal transition for task {task}: {from} -> {to}")]
    IllegalTransition {
        task: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    // Operation failures (exit code 4)
    #[error("Context persistence failed for {path}: {message}")]
    Persistence { path: PathBuf, message: String },

    #[error("Executor failed: {0}")]
    Execution(String),

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
            | Error::DuplicateTask(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::SelfDependency(_)
            | Error::CycleDetected { .. }
            | Error::IllegalTransition { .. } => exit_codes::POLICY_BLOCKED,

            // Operation failures
            Error::Persistence { .. }
            | Error::Execution(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for the JSON error envelope
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::CycleDetected { members } => Some(serde_json::json!({ "members": members })),
            Error::IllegalTransition { task, from, to } => Some(serde_json::json!({
                "task": task,
                "from": from,
                "to": to,
            })),
            Error::Persistence { path, .. } => Some(serde_json::json!({ "path": path })),
            _ => None,
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Persistence {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for tasksmith operations
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
