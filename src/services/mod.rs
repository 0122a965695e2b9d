//! Collaborator services and task-type handlers
//!
//! Contracts live in [`traits`]; [`registry`] maps task types to their
//! handlers and wraps dispatch with the common lifecycle bookkeeping.

pub mod analysis;
pub mod custom;
pub mod deployment;
pub mod fs;
pub mod git;
pub mod optimization;
pub mod patterns;
pub mod refactoring;
pub mod registry;
pub mod script;
pub mod security;
pub mod shell;
pub mod testing;
pub mod traits;

#[cfg(test)]
pub mod stubs;

pub use analysis::AnalysisHandler;
pub use custom::CustomHandler;
pub use deployment::DeploymentHandler;
pub use fs::LocalFileSystem;
pub use git::GitCli;
pub use optimization::OptimizationHandler;
pub use patterns::{CodePatternDetector, RefactoringOpportunity, RegexPatternDetector};
pub use refactoring::RefactoringHandler;
pub use registry::{HandlerContext, HandlerRegistry, TaskTypeHandler};
pub use script::ScriptHandler;
pub use security::SecurityHandler;
pub use shell::ShellExecutor;
pub use testing::{TestingHandler, parse_test_output};
pub use traits::{
    AiService, FileSystemService, GitService, IdeInstance, IdeManager, InMemoryTaskRepository,
    ScriptExecutor, ScriptOutput, ScriptRequest, TaskRepository, TaskRunner, WorkflowDefinition,
    WorkflowExecutor, WorkflowLoader,
};
