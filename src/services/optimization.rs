//! Optimization task handler
//!
//! Asks the AI provider for an optimized version of each target file.
//! Changes are proposals unless `auto_apply` is set; every applied write
//! is preceded by a timestamped backup.

use std::path::PathBuf;

use async_trait::async_trait;
use eyre::Result;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{Execution, TaskKind, TaskType};

use super::registry::{HandlerContext, TaskTypeHandler};

/// Upper bound on files sent to the provider in one run
const MAX_TARGET_FILES: usize = 20;

pub struct OptimizationHandler;

/// Pull the rewritten content out of a provider-shaped response
pub(crate) fn extract_revised_content(response: &Value) -> Option<&str> {
    response
        .get("optimized")
        .or_else(|| response.get("content"))
        .or_else(|| response.get("code"))
        .and_then(|v| v.as_str())
}

/// Resolve the files an optimization/refactoring run operates on
pub(crate) async fn resolve_target_files(
    ctx: &HandlerContext,
    root: &std::path::Path,
    target: Option<&str>,
) -> Result<Vec<PathBuf>> {
    match target {
        Some(target) => Ok(vec![root.join(target)]),
        None => {
            let files = ctx.fs.get_all_files(root).await?;
            Ok(files
                .into_iter()
                .filter(|f| ctx.fs.is_code_file(f))
                .take(MAX_TARGET_FILES)
                .collect())
        }
    }
}

#[async_trait]
impl TaskTypeHandler for OptimizationHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Optimization
    }

    async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value> {
        let (target, optimization_type) = match &execution.task.kind {
            TaskKind::Optimization {
                target,
                optimization_type,
            } => (target.clone(), optimization_type.clone()),
            _ => unreachable!("registry dispatches by task type"),
        };
        let root = ctx.project_root(execution);
        let auto_apply = execution.options.auto_apply;

        ctx.report_progress(execution, 10, "Resolving target files").await;
        let files = resolve_target_files(ctx, &root, target.as_deref()).await?;

        let spec = json!({"optimization_type": optimization_type});
        let ai_options = json!({"model": execution.options.ai_model});

        let mut changes: Vec<Value> = Vec::new();
        let mut applied = 0usize;
        let total = files.len().max(1);

        for (index, file) in files.iter().enumerate() {
            let progress = 20 + ((index * 60) / total) as u8;
            ctx.report_progress(
                execution,
                progress,
                &format!("Optimizing {}", file.display()),
            )
            .await;

            let content = ctx.fs.read_file(file).await?;
            let response = ctx.ai.optimize_code(&content, &spec, &ai_options).await?;

            let Some(revised) = extract_revised_content(&response) else {
                debug!(file = %file.display(), "Provider returned no revised content, skipping");
                changes.push(json!({
                    "file": file.display().to_string(),
                    "applied": false,
                    "reason": "no revised content",
                }));
                continue;
            };

            if auto_apply {
                // Backup must land on disk before the destructive write
                let backup_path = ctx.fs.create_backup(file).await?;
                ctx.fs.write_file(file, revised).await?;
                applied += 1;
                changes.push(json!({
                    "file": file.display().to_string(),
                    "applied": true,
                    "backup_path": backup_path.display().to_string(),
                }));
            } else {
                changes.push(json!({
                    "file": file.display().to_string(),
                    "applied": false,
                    "proposed": revised,
                }));
            }
        }

        ctx.report_progress(execution, 100, "Optimization complete").await;
        Ok(json!({
            "changes": changes,
            "summary": {
                "files_considered": files.len(),
                "proposed": files.len() - applied,
                "applied": applied,
                "auto_apply": auto_apply,
                "optimization_type": optimization_type,
            },
            "metrics": {
                "duration_ms": execution.elapsed_ms(),
            },
        }))
    }
}
