//! Taskforge - Task Execution Queue and Workflow Orchestration Engine
//!
//! Taskforge runs typed development tasks (analysis, optimization, security
//! scanning, testing, deployment, arbitrary scripts) through pluggable
//! handlers, and schedules queued work per project with a strict
//! one-running-item-per-project guarantee.
//!
//! # Core Concepts
//!
//! - **Typed tasks**: Every task is a tagged payload dispatched to exactly
//!   one registered handler
//! - **Tracked executions**: Each run is a stateful record with monotonic
//!   progress, persisted through a swappable store
//! - **Per-project FIFO**: The queue pump promotes at most one item per
//!   project at a time, in arrival order, and reclaims stuck items
//! - **Lifecycle events**: Every transition broadcasts on the event bus
//!
//! # Modules
//!
//! - [`domain`] - Task, execution, and queue-item types
//! - [`services`] - Collaborator contracts and the task-type handlers
//! - [`engine`] - The execution engine and execution store
//! - [`pump`] - The per-project queue pump and queue store
//! - [`events`] - Event bus and event types
//! - [`config`] - Configuration types and loading

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod pump;
pub mod services;

// Re-export commonly used types
pub use config::{Config, EngineConfig, PumpConfig};
pub use domain::{
    Execution, ExecutionOptions, ExecutionStatus, Priority, QueueContext, QueueItem,
    QueueItemOptions, QueueItemStatus, ScanType, Task, TaskKind, TaskType,
};
pub use engine::{EngineDeps, ExecutionEngine, ExecutionStore, InMemoryExecutionStore};
pub use error::EngineError;
pub use events::{EngineEvent, EventBus, create_event_bus};
pub use pump::{InMemoryQueueStore, QueueStore, TaskProcessor};
pub use services::{
    AiService, FileSystemService, GitCli, GitService, HandlerRegistry, InMemoryTaskRepository,
    LocalFileSystem, ScriptExecutor, ShellExecutor, TaskRepository, TaskRunner,
    WorkflowDefinition, WorkflowExecutor, WorkflowLoader,
};
