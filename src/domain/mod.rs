//! Domain types for the execution engine
//!
//! Task (immutable work order), Execution (tracked run), QueueItem
//! (per-project pump unit), plus ID generation.

mod execution;
mod id;
mod queue;
mod task;

pub use execution::{DEFAULT_TIMEOUT_MS, Execution, ExecutionOptions, ExecutionStatus};
pub use id::generate_id;
pub use queue::{Priority, QueueContext, QueueItem, QueueItemOptions, QueueItemPatch, QueueItemStatus};
pub use task::{ScanType, Task, TaskKind, TaskType};
