//! Collaborator service contracts
//!
//! The engine consumes these as named interfaces. Required collaborators
//! (AI, script execution, filesystem) have fields on [`crate::engine::EngineDeps`];
//! the rest are optional and their absence only degrades functionality.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::{ExecutionOptions, Task};

/// AI provider operations consumed by the task-type handlers
///
/// All methods return provider-shaped JSON; failures surface as errors and
/// fail the execution.
#[async_trait]
pub trait AiService: Send + Sync {
    /// Analyze a project tree and return findings
    async fn analyze_project(&self, path: &Path, options: &Value) -> Result<Value>;

    /// Propose an optimized version of a piece of code
    async fn optimize_code(&self, content: &str, spec: &Value, options: &Value) -> Result<Value>;

    /// Assess security posture from scan data
    async fn security_analysis(&self, data: &Value, options: &Value) -> Result<Value>;

    /// Interpret test-runner results
    async fn analyze_test_results(&self, results: &Value, options: &Value) -> Result<Value>;
}

/// Invocation parameters for a script run
#[derive(Debug, Clone, Default)]
pub struct ScriptRequest {
    /// Working directory; inherited from the process when None
    pub cwd: Option<PathBuf>,

    /// Environment overrides layered over the inherited environment
    pub env: HashMap<String, String>,

    /// Hard wall-clock limit; None means no limit
    pub timeout: Option<Duration>,
}

impl ScriptRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Captured output of a script run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutput {
    /// Standard output
    pub output: String,

    /// Standard error
    pub error: String,

    /// Exit code (-1 when killed by signal)
    pub exit_code: i32,

    /// Wall-clock duration of the run
    pub duration_ms: u64,
}

impl ScriptOutput {
    /// Whether the script exited zero
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Shell command execution with timeout enforcement
#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute_script(&self, command: &str, request: ScriptRequest) -> Result<ScriptOutput>;
}

/// Filesystem operations consumed by the handlers
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String>;

    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;

    async fn exists(&self, path: &Path) -> bool;

    /// Find files under `root` matching a glob pattern
    async fn find_files_by_pattern(&self, root: &Path, pattern: &str) -> Result<Vec<PathBuf>>;

    /// All regular files under `root`, excluding vendored/hidden trees
    async fn get_all_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Shallow summary of a project tree (counts, extensions, top level)
    async fn project_structure(&self, root: &Path) -> Result<Value>;

    /// Declared dependencies from recognized manifests
    async fn dependency_info(&self, root: &Path) -> Result<Value>;

    /// Recognized configuration files at the project root
    async fn configuration_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    /// Size and line-count metrics for a project tree
    async fn project_metrics(&self, root: &Path) -> Result<Value>;

    /// Whether a path looks like source code, by extension
    fn is_code_file(&self, path: &Path) -> bool;

    /// Copy a file aside before a destructive write; returns the backup path
    async fn create_backup(&self, path: &Path) -> Result<PathBuf>;
}

/// Task lookup by ID
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn find_by_id(&self, task_id: &str) -> Result<Option<Task>>;
}

/// In-memory task repository
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, returning its ID
    pub async fn insert(&self, task: Task) -> String {
        let id = task.id.clone();
        self.tasks.write().await.insert(id.clone(), task);
        id
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn find_by_id(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }
}

/// A named workflow definition, opaque to the engine beyond its name and
/// the context passed to its executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,

    #[serde(default)]
    pub steps: Value,
}

impl WorkflowDefinition {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Value::Null,
        }
    }
}

/// Workflow lookup by name
#[async_trait]
pub trait WorkflowLoader: Send + Sync {
    async fn get_workflow(&self, name: &str) -> Result<Option<WorkflowDefinition>>;

    /// All known workflow definitions
    async fn load_workflows(&self) -> Result<Vec<WorkflowDefinition>>;
}

/// External workflow interpreter (the preferred execution path)
#[async_trait]
pub trait WorkflowExecutor: Send + Sync {
    async fn execute_workflow(&self, workflow: &WorkflowDefinition, context: &Value) -> Result<Value>;
}

/// Runner invoked by the queue pump with `(task_id, merged_options)`
///
/// [`crate::engine::ExecutionEngine`] implements this: it prefers the
/// workflow path when the workflow collaborators are wired and falls back
/// to direct handler dispatch otherwise.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task_id: &str, options: ExecutionOptions) -> Result<Value>;
}

/// Git context provider (optional collaborator)
#[async_trait]
pub trait GitService: Send + Sync {
    async fn current_branch(&self, root: &Path) -> Result<String>;
}

/// A discovered IDE instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeInstance {
    pub name: String,

    #[serde(default)]
    pub workspace_path: Option<PathBuf>,

    #[serde(default)]
    pub active: bool,
}

/// IDE discovery, consumed by the pump when resolving item context
#[async_trait]
pub trait IdeManager: Send + Sync {
    async fn active_ide(&self) -> Option<IdeInstance>;

    async fn available_ides(&self) -> Vec<IdeInstance>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskKind;

    #[tokio::test]
    async fn test_in_memory_repository() {
        let repo = InMemoryTaskRepository::new();
        let task = Task::new(TaskKind::Analysis { target: None });
        let id = repo.insert(task).await;

        let found = repo.find_by_id(&id).await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().id, id);

        let missing = repo.find_by_id("task-missing").await.unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_script_output_succeeded() {
        let output = ScriptOutput {
            output: String::new(),
            error: String::new(),
            exit_code: 0,
            duration_ms: 1,
        };
        assert!(output.succeeded());

        let output = ScriptOutput { exit_code: 2, ..output };
        assert!(!output.succeeded());
    }

    #[test]
    fn test_script_request_builder() {
        let request = ScriptRequest::new()
            .cwd("/tmp")
            .timeout(Duration::from_secs(5));
        assert_eq!(request.cwd.as_deref(), Some(Path::new("/tmp")));
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
    }
}
