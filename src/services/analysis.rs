//! Analysis task handler
//!
//! Collects project structure and dependency info from the filesystem
//! service, then delegates interpretation to the AI provider.

use async_trait::async_trait;
use eyre::Result;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{Execution, TaskKind, TaskType};

use super::registry::{HandlerContext, TaskTypeHandler};

pub struct AnalysisHandler;

#[async_trait]
impl TaskTypeHandler for AnalysisHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Analysis
    }

    async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value> {
        let target = match &execution.task.kind {
            TaskKind::Analysis { target } => target.clone(),
            _ => None,
        };
        let root = ctx.project_root(execution);

        ctx.report_progress(execution, 10, "Collecting project structure").await;
        let structure = ctx.fs.project_structure(&root).await?;
        let dependencies = ctx.fs.dependency_info(&root).await?;
        let project_metrics = ctx.fs.project_metrics(&root).await?;

        // Branch context is best-effort: absent service or non-repo both
        // leave it null
        let git = match &ctx.git {
            Some(git) => match git.current_branch(&root).await {
                Ok(branch) => json!({"branch": branch}),
                Err(_) => Value::Null,
            },
            None => Value::Null,
        };

        ctx.report_progress(execution, 40, "Running AI analysis").await;
        let ai_options = json!({
            "model": execution.options.ai_model,
            "target": target,
        });
        let request = json!({
            "structure": structure,
            "dependencies": dependencies,
            "target": target,
        });
        debug!(execution_id = %execution.id, root = %root.display(), "Requesting project analysis");
        let analysis = ctx
            .ai
            .analyze_project(&root, &json!({"options": ai_options, "input": request}))
            .await?;

        ctx.report_progress(execution, 90, "Summarizing findings").await;
        let total_files = structure["total_files"].as_u64().unwrap_or(0);
        let code_files = structure["code_files"].as_u64().unwrap_or(0);
        let result = json!({
            "analysis": analysis,
            "structure": structure,
            "dependencies": dependencies,
            "git": git,
            "summary": {
                "total_files": total_files,
                "code_files": code_files,
                "code_lines": project_metrics["code_lines"],
                "dependency_count": dependencies["dependencies"].as_array().map(|a| a.len()).unwrap_or(0),
            },
            "metrics": {
                "duration_ms": execution.elapsed_ms(),
                "project": project_metrics,
            },
        });

        ctx.report_progress(execution, 100, "Analysis complete").await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExecutionStatus;
    use crate::services::stubs::{execution_for, stub_context};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_analysis_produces_summary_and_metrics() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("main.rs"), "fn main() {}").unwrap();
        std::fs::write(temp.path().join("notes.md"), "notes").unwrap();

        let ctx = stub_context();
        let mut exec = execution_for(TaskKind::Analysis { target: None }, temp.path());
        exec.mark_running("starting");

        let result = AnalysisHandler.execute(&mut exec, &ctx).await.unwrap();

        assert_eq!(result["summary"]["total_files"], 2);
        assert_eq!(result["summary"]["code_files"], 1);
        assert_eq!(result["summary"]["code_lines"], 1);
        assert!(result["git"].is_null());
        assert!(result["metrics"]["duration_ms"].is_u64());
        assert!(result["analysis"]["insights"].is_array());
        assert_eq!(exec.progress, 100);
        assert_eq!(exec.status, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn test_analysis_ai_failure_bubbles() {
        let temp = tempdir().unwrap();
        let mut ctx = stub_context();
        ctx.ai = std::sync::Arc::new(crate::services::stubs::FailingAi);

        let mut exec = execution_for(TaskKind::Analysis { target: None }, temp.path());
        let err = AnalysisHandler.execute(&mut exec, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("provider unavailable"));
    }
}
