//! Queue item domain types
//!
//! A QueueItem is the unit scheduled by the per-project queue pump. It is
//! coarser grained than an Execution: it carries workflow context and the
//! options the runner is invoked with, and its status is what the pump
//! persists.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::execution::ExecutionOptions;
use super::id::generate_id;

/// Priority for engine-level queue items
///
/// Carried on pending items but not enforced as a sort key; dispatch
/// order stays FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Queue item status
///
/// `Queued → Running → {Completed | Failed}`; terminal states have no
/// outgoing transitions. A Running item past the stuck threshold is
/// re-selected by the pump, which is a `Running → Running` reclaim, not a
/// distinct state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueueItemStatus {
    #[default]
    Queued,
    Running,
    Completed,
    Failed,
}

impl QueueItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for QueueItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Workflow context carried by a queue item
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueContext {
    /// The task this item will run
    pub task_id: String,

    /// Project path, when known at submission time
    pub project_path: Option<PathBuf>,

    /// Arbitrary prior-step outputs passed through to the runner
    pub extra: serde_json::Map<String, Value>,
}

/// Per-item scheduling options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueItemOptions {
    /// Whether the pump may promote this item without an external trigger
    pub auto_execute: bool,

    /// Execution options forwarded to the runner
    pub execution: ExecutionOptions,
}

impl Default for QueueItemOptions {
    fn default() -> Self {
        Self {
            auto_execute: true,
            execution: ExecutionOptions::default(),
        }
    }
}

/// The unit scheduled by the per-project queue pump
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique identifier
    pub id: String,

    /// Workflow context (task id, project path, prior-step outputs)
    pub context: QueueContext,

    /// Scheduling options
    pub options: QueueItemOptions,

    /// Current status
    pub status: QueueItemStatus,

    /// When the pump last promoted this item to running
    pub started_at: Option<DateTime<Utc>>,

    /// When the item reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// Runner result (on success)
    pub result: Option<Value>,

    /// Error message (on failure)
    pub error: Option<String>,
}

impl QueueItem {
    /// Create a queued item for a task
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            id: generate_id("item"),
            context: QueueContext {
                task_id: task_id.into(),
                ..Default::default()
            },
            options: QueueItemOptions::default(),
            status: QueueItemStatus::Queued,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// Builder method to set the project path in context
    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.context.project_path = Some(path.into());
        self
    }

    /// Builder method to set execution options
    pub fn with_execution_options(mut self, options: ExecutionOptions) -> Self {
        self.options.execution = options;
        self
    }

    /// Builder method to disable auto-execution
    pub fn manual(mut self) -> Self {
        self.options.auto_execute = false;
        self
    }

    /// Whether the pump may promote this item this tick
    pub fn is_promotable(&self) -> bool {
        self.status == QueueItemStatus::Queued && self.options.auto_execute
    }

    /// Whether this running item has exceeded the stuck threshold
    pub fn is_stuck(&self, threshold: std::time::Duration) -> bool {
        if self.status != QueueItemStatus::Running {
            return false;
        }
        match self.started_at {
            Some(started) => {
                let elapsed = (Utc::now() - started).num_milliseconds().max(0) as u128;
                elapsed > threshold.as_millis()
            }
            // Running with no start stamp is treated as stuck
            None => true,
        }
    }
}

/// Partial update persisted through the queue store
#[derive(Debug, Clone, Default)]
pub struct QueueItemPatch {
    pub status: Option<QueueItemStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl QueueItemPatch {
    /// Patch for promoting an item to running
    pub fn running() -> Self {
        Self {
            status: Some(QueueItemStatus::Running),
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Patch for a successful completion
    pub fn completed(result: Value) -> Self {
        Self {
            status: Some(QueueItemStatus::Completed),
            completed_at: Some(Utc::now()),
            result: Some(result),
            ..Default::default()
        }
    }

    /// Patch for a failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(QueueItemStatus::Failed),
            completed_at: Some(Utc::now()),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Apply this patch to an item
    pub fn apply(self, item: &mut QueueItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(started_at) = self.started_at {
            item.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            item.completed_at = Some(completed_at);
        }
        if let Some(result) = self.result {
            item.result = Some(result);
        }
        if let Some(error) = self.error {
            item.error = Some(error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_queue_item_new() {
        let item = QueueItem::new("task-1");
        assert!(item.id.starts_with("item-"));
        assert_eq!(item.context.task_id, "task-1");
        assert_eq!(item.status, QueueItemStatus::Queued);
        assert!(item.is_promotable());
    }

    #[test]
    fn test_manual_item_not_promotable() {
        let item = QueueItem::new("task-1").manual();
        assert!(!item.is_promotable());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!QueueItemStatus::Queued.is_terminal());
        assert!(!QueueItemStatus::Running.is_terminal());
        assert!(QueueItemStatus::Completed.is_terminal());
        assert!(QueueItemStatus::Failed.is_terminal());
    }

    #[test]
    fn test_is_stuck() {
        let mut item = QueueItem::new("task-1");
        let threshold = Duration::from_secs(30);

        // Queued items are never stuck
        assert!(!item.is_stuck(threshold));

        // Freshly started running item is not stuck
        item.status = QueueItemStatus::Running;
        item.started_at = Some(Utc::now());
        assert!(!item.is_stuck(threshold));

        // Started beyond the threshold is stuck
        item.started_at = Some(Utc::now() - chrono::Duration::seconds(31));
        assert!(item.is_stuck(threshold));

        // Running with no start stamp counts as stuck
        item.started_at = None;
        assert!(item.is_stuck(threshold));
    }

    #[test]
    fn test_patch_apply() {
        let mut item = QueueItem::new("task-1");

        QueueItemPatch::running().apply(&mut item);
        assert_eq!(item.status, QueueItemStatus::Running);
        assert!(item.started_at.is_some());

        QueueItemPatch::completed(serde_json::json!({"ok": true})).apply(&mut item);
        assert_eq!(item.status, QueueItemStatus::Completed);
        assert!(item.completed_at.is_some());
        assert!(item.result.is_some());
        assert!(item.error.is_none());
    }

    #[test]
    fn test_patch_failed() {
        let mut item = QueueItem::new("task-1");
        QueueItemPatch::failed("boom").apply(&mut item);
        assert_eq!(item.status, QueueItemStatus::Failed);
        assert_eq!(item.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
