//! Test stubs for handler unit tests

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use serde_json::{Value, json};

use crate::domain::{Execution, ExecutionOptions, Task, TaskKind};
use crate::engine::InMemoryExecutionStore;

use super::fs::LocalFileSystem;
use super::registry::HandlerContext;
use super::shell::ShellExecutor;
use super::traits::AiService;

/// AI service returning canned JSON for every call
pub struct StubAi;

#[async_trait]
impl AiService for StubAi {
    async fn analyze_project(&self, path: &Path, _options: &Value) -> Result<Value> {
        Ok(json!({"insights": ["stub"], "path": path.display().to_string()}))
    }

    async fn optimize_code(&self, content: &str, _spec: &Value, _options: &Value) -> Result<Value> {
        Ok(json!({"optimized": format!("// optimized\n{}", content)}))
    }

    async fn security_analysis(&self, _data: &Value, _options: &Value) -> Result<Value> {
        Ok(json!({"risk": "low", "notes": []}))
    }

    async fn analyze_test_results(&self, results: &Value, _options: &Value) -> Result<Value> {
        Ok(json!({"verdict": "stub", "results": results}))
    }
}

/// AI service that fails every call
pub struct FailingAi;

#[async_trait]
impl AiService for FailingAi {
    async fn analyze_project(&self, _path: &Path, _options: &Value) -> Result<Value> {
        Err(eyre::eyre!("provider unavailable"))
    }

    async fn optimize_code(&self, _content: &str, _spec: &Value, _options: &Value) -> Result<Value> {
        Err(eyre::eyre!("provider unavailable"))
    }

    async fn security_analysis(&self, _data: &Value, _options: &Value) -> Result<Value> {
        Err(eyre::eyre!("provider unavailable"))
    }

    async fn analyze_test_results(&self, _results: &Value, _options: &Value) -> Result<Value> {
        Err(eyre::eyre!("provider unavailable"))
    }
}

/// Handler context wired with real shell/fs services and the stub AI
pub fn stub_context() -> HandlerContext {
    HandlerContext {
        ai: Arc::new(StubAi),
        script: Arc::new(ShellExecutor::new()),
        fs: Arc::new(LocalFileSystem::new()),
        store: Arc::new(InMemoryExecutionStore::new()),
        events: None,
        git: None,
    }
}

/// Execution rooted at the given project path
pub fn execution_for(kind: TaskKind, project_path: &Path) -> Execution {
    let task = Task::new(kind).with_project_path(project_path);
    Execution::new(task, ExecutionOptions::default())
}

/// Execution with auto-apply enabled
pub fn auto_apply_execution_for(kind: TaskKind, project_path: &Path) -> Execution {
    let task = Task::new(kind).with_project_path(project_path);
    let options = ExecutionOptions {
        auto_apply: true,
        ..Default::default()
    };
    Execution::new(task, options)
}
