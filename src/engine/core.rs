//! Task execution engine
//!
//! Owns the execution lifecycle: creates records, dispatches them through
//! the handler registry, persists terminal state, and emits lifecycle
//! events. Also carries the engine-level pending queue (the coarse,
//! concurrency-capped path predating the per-project pump).

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use serde_json::{Value, json};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::domain::{Execution, ExecutionOptions, Priority, Task, generate_id};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventBus};
use crate::services::registry::{HandlerContext, HandlerRegistry};
use crate::services::traits::{
    AiService, FileSystemService, GitService, ScriptExecutor, TaskRepository, TaskRunner,
    WorkflowExecutor, WorkflowLoader,
};

use super::store::{ExecutionStore, InMemoryExecutionStore};

/// Engine collaborators
///
/// AI, script execution, and filesystem access are required; the rest are
/// optional and their absence only narrows what the engine can do (no
/// workflow path without the workflow pair, no events without a bus).
pub struct EngineDeps {
    pub ai: Arc<dyn AiService>,
    pub script: Arc<dyn ScriptExecutor>,
    pub fs: Arc<dyn FileSystemService>,
    pub store: Arc<dyn ExecutionStore>,
    pub events: Option<Arc<EventBus>>,
    pub git: Option<Arc<dyn GitService>>,
    pub tasks: Option<Arc<dyn TaskRepository>>,
    pub workflow_loader: Option<Arc<dyn WorkflowLoader>>,
    pub workflow_executor: Option<Arc<dyn WorkflowExecutor>>,
}

impl EngineDeps {
    /// Dependencies with the required collaborators and an in-memory store
    pub fn new(
        ai: Arc<dyn AiService>,
        script: Arc<dyn ScriptExecutor>,
        fs: Arc<dyn FileSystemService>,
    ) -> Self {
        Self {
            ai,
            script,
            fs,
            store: Arc::new(InMemoryExecutionStore::new()),
            events: None,
            git: None,
            tasks: None,
            workflow_loader: None,
            workflow_executor: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn ExecutionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_git(mut self, git: Arc<dyn GitService>) -> Self {
        self.git = Some(git);
        self
    }

    pub fn with_tasks(mut self, tasks: Arc<dyn TaskRepository>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    pub fn with_workflow(
        mut self,
        loader: Arc<dyn WorkflowLoader>,
        executor: Arc<dyn WorkflowExecutor>,
    ) -> Self {
        self.workflow_loader = Some(loader);
        self.workflow_executor = Some(executor);
        self
    }

    /// Log which optional collaborators are absent
    pub fn validate(&self) {
        if self.events.is_none() {
            warn!("No event bus wired; lifecycle events will not be emitted");
        }
        if self.tasks.is_none() {
            warn!("No task repository wired; task-id lookup paths are unavailable");
        }
        if self.workflow_loader.is_none() || self.workflow_executor.is_none() {
            warn!("Workflow collaborators absent; runner falls back to direct dispatch");
        }
        if self.git.is_none() {
            debug!("No git service wired");
        }
    }
}

/// A task waiting on the engine-level queue
struct PendingTask {
    id: String,
    task: Task,
    options: ExecutionOptions,
    priority: Priority,
}

/// The task execution engine
///
/// Cheap to clone; all state is behind shared handles.
#[derive(Clone)]
pub struct ExecutionEngine {
    registry: Arc<HandlerRegistry>,
    ai: Arc<dyn AiService>,
    script: Arc<dyn ScriptExecutor>,
    fs: Arc<dyn FileSystemService>,
    store: Arc<dyn ExecutionStore>,
    events: Option<Arc<EventBus>>,
    git: Option<Arc<dyn GitService>>,
    tasks: Option<Arc<dyn TaskRepository>>,
    workflow_loader: Option<Arc<dyn WorkflowLoader>>,
    workflow_executor: Option<Arc<dyn WorkflowExecutor>>,
    config: EngineConfig,
    pending: Arc<Mutex<VecDeque<PendingTask>>>,
    /// Caps in-flight executions on the engine-level queue path
    concurrency: Arc<Semaphore>,
}

impl ExecutionEngine {
    pub fn new(deps: EngineDeps, config: EngineConfig) -> Self {
        deps.validate();
        Self {
            registry: Arc::new(HandlerRegistry::standard()),
            ai: deps.ai,
            script: deps.script,
            fs: deps.fs,
            store: deps.store,
            events: deps.events,
            git: deps.git,
            tasks: deps.tasks,
            workflow_loader: deps.workflow_loader,
            workflow_executor: deps.workflow_executor,
            concurrency: Arc::new(Semaphore::new(config.max_concurrent_executions)),
            config,
            pending: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Replace the handler registry (custom handler sets)
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    fn handler_context(&self) -> HandlerContext {
        HandlerContext {
            ai: Arc::clone(&self.ai),
            script: Arc::clone(&self.script),
            fs: Arc::clone(&self.fs),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            git: self.git.clone(),
        }
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    fn tasks_or_err(&self) -> Result<&Arc<dyn TaskRepository>> {
        self.tasks
            .as_ref()
            .ok_or_else(|| EngineError::MissingDependency { name: "task repository" }.into())
    }

    async fn task_by_id(&self, task_id: &str) -> Result<Task> {
        self.tasks_or_err()?
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| {
                EngineError::NotFound {
                    kind: "task",
                    id: task_id.to_string(),
                }
                .into()
            })
    }

    /// Execute a task through its registered workflow
    ///
    /// The workflow name comes from the options' task mode, falling back to
    /// the configured default. Requires the task repository and both
    /// workflow collaborators.
    pub async fn execute_workflow(&self, task_id: &str, options: ExecutionOptions) -> Result<Value> {
        let loader = self
            .workflow_loader
            .as_ref()
            .ok_or(EngineError::MissingDependency { name: "workflow loader" })?;
        let executor = self
            .workflow_executor
            .as_ref()
            .ok_or(EngineError::MissingDependency { name: "workflow executor" })?;
        let task = self.task_by_id(task_id).await?;

        let workflow_name = options
            .task_mode
            .clone()
            .unwrap_or_else(|| self.config.default_workflow.clone());
        let workflow = loader
            .get_workflow(&workflow_name)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                kind: "workflow",
                id: workflow_name.clone(),
            })?;

        info!(task_id, workflow = %workflow.name, "Executing task through workflow");
        let context = json!({
            "task": task,
            "options": options,
        });
        executor.execute_workflow(&workflow, &context).await
    }

    /// Legacy alias for [`Self::execute_workflow`]
    ///
    /// Kept for callers that predate the workflow path; fails with a
    /// missing-dependency error when the workflow collaborators are not
    /// wired.
    pub async fn execute_task(&self, task_id: &str, options: ExecutionOptions) -> Result<Value> {
        self.execute_workflow(task_id, options).await
    }

    /// Run a task through the handler registry, tracking it end to end
    ///
    /// Creates and persists the execution record, dispatches it, and
    /// persists the terminal transition before returning. Handler errors
    /// are recorded on the execution and re-thrown.
    pub async fn run_task(&self, task: Task, options: ExecutionOptions) -> Result<Value> {
        let mut execution = Execution::new(task, options);
        let execution_id = execution.id.clone();
        self.store.insert(execution.clone()).await;
        self.emit(EngineEvent::ExecutionRequested {
            execution_id: execution_id.clone(),
            task_id: execution.task_id.clone(),
            task_type: execution.task.task_type(),
        });

        let ctx = self.handler_context();
        match self.registry.execute(&mut execution, &ctx).await {
            Ok(result) => {
                execution.complete(result.clone());
                self.store.update(execution.clone()).await;
                self.emit(EngineEvent::ExecutionCompleted {
                    execution_id: execution_id.clone(),
                    duration_ms: execution.duration_ms.unwrap_or(0),
                });
                info!(execution_id = %execution_id, "Execution completed");
                Ok(result)
            }
            Err(e) => {
                execution.fail(e.to_string());
                self.store.update(execution).await;
                self.emit(EngineEvent::ExecutionFailed {
                    execution_id: execution_id.clone(),
                    message: e.to_string(),
                });
                error!(execution_id = %execution_id, error = %e, "Execution failed");
                Err(e)
            }
        }
    }

    /// Cooperatively cancel an execution
    ///
    /// Returns false for unknown ids and executions already terminal;
    /// cancelling is never an error.
    pub async fn cancel_execution(&self, execution_id: &str) -> bool {
        let Some(mut execution) = self.store.get(execution_id).await else {
            debug!(execution_id, "Cancel requested for unknown execution");
            return false;
        };
        if execution.is_terminal() {
            return false;
        }
        execution.cancel();
        self.store.update(execution).await;
        self.emit(EngineEvent::ExecutionCancelled {
            execution_id: execution_id.to_string(),
        });
        info!(execution_id, "Execution cancelled");
        true
    }

    /// Pause a running execution; false when not running or unknown
    pub async fn pause_execution(&self, execution_id: &str) -> bool {
        let Some(mut execution) = self.store.get(execution_id).await else {
            return false;
        };
        if !execution.pause() {
            return false;
        }
        self.store.update(execution).await;
        self.emit(EngineEvent::ExecutionPaused {
            execution_id: execution_id.to_string(),
        });
        true
    }

    /// Resume a paused execution; false when not paused or unknown
    pub async fn resume_execution(&self, execution_id: &str) -> bool {
        let Some(mut execution) = self.store.get(execution_id).await else {
            return false;
        };
        if !execution.resume() {
            return false;
        }
        self.store.update(execution).await;
        self.emit(EngineEvent::ExecutionResumed {
            execution_id: execution_id.to_string(),
        });
        true
    }

    /// Fetch an execution's current state; None for unknown ids
    pub async fn get_execution_status(&self, execution_id: &str) -> Option<Execution> {
        self.store.get(execution_id).await
    }

    /// All tracked executions
    pub async fn list_executions(&self) -> Vec<Execution> {
        self.store.list().await
    }

    /// Add a task to the engine-level pending queue
    ///
    /// Priority is recorded but the queue drains FIFO. Returns the pending
    /// entry's id.
    pub async fn add_to_queue(
        &self,
        task: Task,
        options: ExecutionOptions,
        priority: Option<Priority>,
    ) -> String {
        let entry = PendingTask {
            id: generate_id("pending"),
            task,
            options,
            priority: priority.unwrap_or_default(),
        };
        let id = entry.id.clone();
        debug!(pending_id = %id, priority = %entry.priority, "Task queued");
        self.pending.lock().await.push_back(entry);
        id
    }

    /// Number of tasks waiting on the engine-level queue
    pub async fn queue_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Drain the pending queue, running tasks under the concurrency cap
    ///
    /// Each task runs on its own spawned task; failures are logged and do
    /// not stop the drain.
    pub async fn process_queue(&self) {
        loop {
            let Some(entry) = self.pending.lock().await.pop_front() else {
                break;
            };
            let permit = match Arc::clone(&self.concurrency).acquire_owned().await {
                Ok(permit) => permit,
                // Closed semaphore means the engine is shutting down
                Err(_) => break,
            };
            let engine = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = engine.run_task(entry.task, entry.options).await {
                    warn!(pending_id = %entry.id, error = %e, "Queued task failed");
                }
            });
        }
    }
}

/// The pump invokes the engine through this seam: the workflow path when
/// the workflow collaborators are wired, direct dispatch otherwise.
#[async_trait]
impl TaskRunner for ExecutionEngine {
    async fn run(&self, task_id: &str, options: ExecutionOptions) -> Result<Value> {
        let workflow_wired = self.tasks.is_some()
            && self.workflow_loader.is_some()
            && self.workflow_executor.is_some();
        if workflow_wired {
            self.execute_workflow(task_id, options).await
        } else {
            let task = self.task_by_id(task_id).await?;
            self.run_task(task, options).await
        }
    }
}
