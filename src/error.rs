//! Engine error taxonomy

use thiserror::Error;

/// Errors raised by the execution engine and its services
#[derive(Debug, Error)]
pub enum EngineError {
    /// Task payload failed shape validation; the caller must fix the
    /// payload before retrying.
    #[error("Invalid task: {0}")]
    Validation(String),

    /// A referenced record does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// A required or path-specific collaborator is not wired
    #[error("Required collaborator missing: {name}")]
    MissingDependency { name: &'static str },

    /// No handler is registered for a task type
    #[error("No handler registered for task type: {task_type}")]
    UnsupportedTaskType { task_type: String },

    /// A handler-level failure, logged and persisted as terminal state
    #[error("Execution {execution_id} failed: {message}")]
    Execution { execution_id: String, message: String },

    /// A script or AI invocation exceeded its timeout
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A script exited non-zero
    #[error("Script exited with code {exit_code}: {stderr}")]
    ScriptFailed { exit_code: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = EngineError::NotFound {
            kind: "task",
            id: "task-42".to_string(),
        };
        assert_eq!(err.to_string(), "task not found: task-42");
    }

    #[test]
    fn test_timeout_message() {
        let err = EngineError::Timeout { timeout_ms: 300_000 };
        assert!(err.to_string().contains("300000"));
    }

    #[test]
    fn test_downcast_through_eyre() {
        let report: eyre::Report = EngineError::Validation("bad".to_string()).into();
        assert!(report.downcast_ref::<EngineError>().is_some());
    }
}
