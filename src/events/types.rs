//! Engine event types
//!
//! Events mirror the engine's externally observable lifecycle:
//! `task:execution:*` for executions and `queue:item:*` for the pump.

use serde::{Deserialize, Serialize};

use crate::domain::TaskType;

/// An engine lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An execution was requested (record created, not yet dispatched)
    ExecutionRequested {
        execution_id: String,
        task_id: String,
        task_type: TaskType,
    },

    /// A handler started doing work
    ExecutionStarted { execution_id: String },

    /// Mid-flight progress update
    ExecutionProgress {
        execution_id: String,
        progress: u8,
        step: String,
    },

    /// Execution finished with a result
    ExecutionCompleted {
        execution_id: String,
        duration_ms: u64,
    },

    /// Execution finished with an error
    ExecutionFailed {
        execution_id: String,
        message: String,
    },

    /// Execution was cancelled by the caller
    ExecutionCancelled { execution_id: String },

    /// Execution was paused
    ExecutionPaused { execution_id: String },

    /// Execution was resumed
    ExecutionResumed { execution_id: String },

    /// A queue item was appended to a project queue
    QueueItemAdded { project_id: String, item_id: String },

    /// A queue item completed successfully
    QueueItemCompleted { project_id: String, item_id: String },

    /// A queue item failed
    QueueItemFailed {
        project_id: String,
        item_id: String,
        message: String,
    },
}

impl EngineEvent {
    /// Wire-style event name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ExecutionRequested { .. } => "task:execution:requested",
            Self::ExecutionStarted { .. } => "task:execution:start",
            Self::ExecutionProgress { .. } => "task:execution:progress",
            Self::ExecutionCompleted { .. } => "task:execution:complete",
            Self::ExecutionFailed { .. } => "task:execution:error",
            Self::ExecutionCancelled { .. } => "task:execution:cancelled",
            Self::ExecutionPaused { .. } => "task:execution:paused",
            Self::ExecutionResumed { .. } => "task:execution:resumed",
            Self::QueueItemAdded { .. } => "queue:item:added",
            Self::QueueItemCompleted { .. } => "queue:item:completed",
            Self::QueueItemFailed { .. } => "queue:item:failed",
        }
    }

    /// Execution ID for execution-scoped events
    pub fn execution_id(&self) -> Option<&str> {
        match self {
            Self::ExecutionRequested { execution_id, .. }
            | Self::ExecutionStarted { execution_id }
            | Self::ExecutionProgress { execution_id, .. }
            | Self::ExecutionCompleted { execution_id, .. }
            | Self::ExecutionFailed { execution_id, .. }
            | Self::ExecutionCancelled { execution_id }
            | Self::ExecutionPaused { execution_id }
            | Self::ExecutionResumed { execution_id } => Some(execution_id),
            _ => None,
        }
    }

    /// Project ID for queue-scoped events
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::QueueItemAdded { project_id, .. }
            | Self::QueueItemCompleted { project_id, .. }
            | Self::QueueItemFailed { project_id, .. } => Some(project_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_names() {
        let event = EngineEvent::ExecutionCompleted {
            execution_id: "exec-1".to_string(),
            duration_ms: 12,
        };
        assert_eq!(event.event_type(), "task:execution:complete");

        let event = EngineEvent::QueueItemAdded {
            project_id: "p1".to_string(),
            item_id: "item-1".to_string(),
        };
        assert_eq!(event.event_type(), "queue:item:added");
    }

    #[test]
    fn test_event_accessors() {
        let event = EngineEvent::ExecutionCancelled {
            execution_id: "exec-9".to_string(),
        };
        assert_eq!(event.execution_id(), Some("exec-9"));
        assert_eq!(event.project_id(), None);

        let event = EngineEvent::QueueItemFailed {
            project_id: "p1".to_string(),
            item_id: "item-2".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(event.project_id(), Some("p1"));
        assert_eq!(event.execution_id(), None);
    }

    #[test]
    fn test_event_serde() {
        let event = EngineEvent::ExecutionProgress {
            execution_id: "exec-3".to_string(),
            progress: 40,
            step: "Running script".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"execution_progress\""));

        let back: EngineEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.execution_id(), Some("exec-3"));
    }
}
