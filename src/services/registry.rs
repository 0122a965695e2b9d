//! Task-type handler registry
//!
//! Dispatch is a registry keyed by [`TaskType`]: each handler implements
//! one execution strategy, and the registry owns the uniform prologue
//! (payload validation, running transition) and the uniform error policy
//! (log with execution id, re-throw; the engine persists terminal state).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use serde_json::Value;
use tracing::{debug, error};

use crate::domain::{Execution, TaskType};
use crate::engine::ExecutionStore;
use crate::events::{EngineEvent, EventBus};

use super::analysis::AnalysisHandler;
use super::custom::CustomHandler;
use super::deployment::DeploymentHandler;
use super::optimization::OptimizationHandler;
use super::refactoring::RefactoringHandler;
use super::script::ScriptHandler;
use super::security::SecurityHandler;
use super::testing::TestingHandler;
use super::traits::{AiService, FileSystemService, GitService, ScriptExecutor};

/// Shared collaborators and the progress route available to handlers
pub struct HandlerContext {
    pub ai: Arc<dyn AiService>,
    pub script: Arc<dyn ScriptExecutor>,
    pub fs: Arc<dyn FileSystemService>,
    pub store: Arc<dyn ExecutionStore>,
    pub events: Option<Arc<EventBus>>,
    pub git: Option<Arc<dyn GitService>>,
}

impl HandlerContext {
    /// Shared progress-update routine
    ///
    /// Applies the monotonic progress update to the execution, persists
    /// the record, and emits a progress event. This is the only
    /// externally observable mid-flight signal.
    pub async fn report_progress(&self, execution: &mut Execution, progress: u8, step: &str) {
        let effective = execution.update_progress(progress, step);
        self.store.update(execution.clone()).await;
        if let Some(events) = &self.events {
            events.emit(EngineEvent::ExecutionProgress {
                execution_id: execution.id.clone(),
                progress: effective,
                step: step.to_string(),
            });
        }
        debug!(execution_id = %execution.id, progress = effective, %step, "Progress");
    }

    /// Resolve the project root for an execution
    ///
    /// Options take precedence over the task's own path; falls back to
    /// the process working directory.
    pub fn project_root(&self, execution: &Execution) -> PathBuf {
        execution
            .options
            .project_path
            .clone()
            .or_else(|| execution.task.project_path.clone())
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// One task-type execution strategy
#[async_trait]
pub trait TaskTypeHandler: Send + Sync {
    /// The task type this handler executes
    fn task_type(&self) -> TaskType;

    /// Perform the work, updating progress along the way
    ///
    /// Returns the structured result payload; errors bubble to the engine
    /// which persists the failed state.
    async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value>;
}

/// Registry mapping task type to handler
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Box<dyn TaskTypeHandler>>,
}

impl HandlerRegistry {
    /// Registry with the eight standard handlers
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(AnalysisHandler));
        registry.register(Box::new(ScriptHandler));
        registry.register(Box::new(OptimizationHandler));
        registry.register(Box::new(SecurityHandler));
        registry.register(Box::new(RefactoringHandler::default()));
        registry.register(Box::new(TestingHandler));
        registry.register(Box::new(DeploymentHandler));
        registry.register(Box::new(CustomHandler));
        registry
    }

    /// Empty registry (for testing or custom handler sets)
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any existing one for its type
    pub fn register(&mut self, handler: Box<dyn TaskTypeHandler>) {
        self.handlers.insert(handler.task_type(), handler);
    }

    /// Check if a handler exists for a task type
    pub fn has_handler(&self, task_type: TaskType) -> bool {
        self.handlers.contains_key(&task_type)
    }

    /// Registered task types
    pub fn handler_types(&self) -> Vec<TaskType> {
        self.handlers.keys().copied().collect()
    }

    /// Dispatch an execution to its handler
    ///
    /// The uniform shape: validate the payload, transition to running with
    /// an initial step, run the strategy. On error, log with the execution
    /// id and re-throw; the caller turns the error into terminal state.
    pub async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value> {
        let task_type = execution.task.task_type();
        let handler = self
            .handlers
            .get(&task_type)
            .ok_or_else(|| crate::error::EngineError::UnsupportedTaskType {
                task_type: task_type.to_string(),
            })?;

        execution.task.validate()?;
        execution.mark_running(format!("Starting {} task", task_type));
        ctx.store.update(execution.clone()).await;
        if let Some(events) = &ctx.events {
            events.emit(EngineEvent::ExecutionStarted {
                execution_id: execution.id.clone(),
            });
        }

        match handler.execute(execution, ctx).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!(execution_id = %execution.id, error = %e, "Handler failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_covers_all_types() {
        let registry = HandlerRegistry::standard();
        for task_type in TaskType::ALL {
            assert!(registry.has_handler(task_type), "missing handler for {}", task_type);
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = HandlerRegistry::empty();
        assert!(!registry.has_handler(TaskType::Script));
        assert!(registry.handler_types().is_empty());
    }
}
