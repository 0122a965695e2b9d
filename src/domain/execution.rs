//! Execution domain type
//!
//! Tracks the runtime state of one task run: status, progress, timing,
//! and the terminal result or error.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::generate_id;
use super::task::Task;

/// Default script/AI invocation timeout (5 minutes)
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Record created, handler not yet dispatched
    #[default]
    Preparing,
    /// Handler is doing work
    Running,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Error,
    /// Caller requested cancellation
    Cancelled,
    /// Caller requested pause
    Paused,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Preparing => write!(f, "preparing"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Paused => write!(f, "paused"),
        }
    }
}

/// Merged runtime configuration for one execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    pub user_id: Option<String>,
    pub project_id: Option<String>,
    pub project_path: Option<PathBuf>,
    /// Per-invocation timeout; falls back to [`DEFAULT_TIMEOUT_MS`]
    pub timeout_ms: Option<u64>,
    /// Gate for writing proposed changes to disk
    pub auto_apply: bool,
    pub ai_model: Option<String>,
    pub environment: Option<String>,
    /// Workflow name selector, defaults to the standard workflow
    pub task_mode: Option<String>,
    /// Arbitrary pass-through options (IDE context, prior-step outputs)
    pub extra: serde_json::Map<String, Value>,
}

impl ExecutionOptions {
    /// Effective timeout for script/AI invocations
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS))
    }
}

/// A tracked, stateful run of one task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique identifier
    pub id: String,

    /// ID of the task being run
    pub task_id: String,

    /// The task work order (referenced, never mutated)
    pub task: Task,

    /// Merged runtime configuration
    pub options: ExecutionOptions,

    /// Current status
    pub status: ExecutionStatus,

    /// Progress percentage, 0-100, monotonic non-decreasing within a run
    pub progress: u8,

    /// Human-readable description of the current step
    pub current_step: String,

    /// When the execution was created
    pub started_at: DateTime<Utc>,

    /// When the execution reached a terminal state
    pub ended_at: Option<DateTime<Utc>>,

    /// Wall-clock duration, stamped at terminal transition
    pub duration_ms: Option<u64>,

    /// Type-specific result payload (on success)
    pub result: Option<Value>,

    /// Error message (on failure)
    pub error: Option<String>,
}

impl Execution {
    /// Create a new execution for a task
    pub fn new(task: Task, options: ExecutionOptions) -> Self {
        Self {
            id: generate_id("exec"),
            task_id: task.id.clone(),
            task,
            options,
            status: ExecutionStatus::Preparing,
            progress: 0,
            current_step: "Preparing".to_string(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            result: None,
            error: None,
        }
    }

    /// Transition to running with an initial step description
    pub fn mark_running(&mut self, step: impl Into<String>) {
        self.status = ExecutionStatus::Running;
        self.current_step = step.into();
    }

    /// Update progress and step description
    ///
    /// Progress is clamped to 100 and never decreases; a stale lower
    /// percentage only updates the step text. Returns the effective
    /// percentage after the update.
    pub fn update_progress(&mut self, progress: u8, step: impl Into<String>) -> u8 {
        self.progress = self.progress.max(progress.min(100));
        self.current_step = step.into();
        self.progress
    }

    /// Milliseconds elapsed since the execution started
    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Transition to completed with a result, forcing progress to 100
    pub fn complete(&mut self, result: Value) {
        self.status = ExecutionStatus::Completed;
        self.progress = 100;
        self.current_step = "Completed".to_string();
        self.result = Some(result);
        self.stamp_end();
    }

    /// Transition to error with a message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ExecutionStatus::Error;
        self.current_step = "Failed".to_string();
        self.error = Some(message.into());
        self.stamp_end();
    }

    /// Transition to cancelled
    pub fn cancel(&mut self) {
        self.status = ExecutionStatus::Cancelled;
        self.current_step = "Cancelled".to_string();
        self.stamp_end();
    }

    /// Cooperative pause flag; returns false unless currently running
    pub fn pause(&mut self) -> bool {
        if self.status == ExecutionStatus::Running {
            self.status = ExecutionStatus::Paused;
            true
        } else {
            false
        }
    }

    /// Resume from pause; returns false unless currently paused
    pub fn resume(&mut self) -> bool {
        if self.status == ExecutionStatus::Paused {
            self.status = ExecutionStatus::Running;
            true
        } else {
            false
        }
    }

    /// Check if the execution reached a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::Completed | ExecutionStatus::Error | ExecutionStatus::Cancelled
        )
    }

    fn stamp_end(&mut self) {
        let now = Utc::now();
        self.ended_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds().max(0) as u64);
    }
}
