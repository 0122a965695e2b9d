//! Refactoring task handler
//!
//! Detects opportunities with the pattern detector, builds a plan, and
//! only rewrites files (AI-assisted, backup first) when `auto_apply` is
//! set.

use async_trait::async_trait;
use eyre::Result;
use serde_json::{Value, json};

use crate::domain::{Execution, TaskKind, TaskType};

use super::optimization::{extract_revised_content, resolve_target_files};
use super::patterns::{CodePatternDetector, RefactoringOpportunity, RegexPatternDetector};
use super::registry::{HandlerContext, TaskTypeHandler};

pub struct RefactoringHandler {
    detector: Box<dyn CodePatternDetector>,
}

impl RefactoringHandler {
    pub fn new(detector: Box<dyn CodePatternDetector>) -> Self {
        Self { detector }
    }
}

impl Default for RefactoringHandler {
    fn default() -> Self {
        Self::new(Box::new(RegexPatternDetector::new()))
    }
}

#[async_trait]
impl TaskTypeHandler for RefactoringHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Refactoring
    }

    async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value> {
        let (target, refactoring_type) = match &execution.task.kind {
            TaskKind::Refactoring {
                target,
                refactoring_type,
            } => (target.clone(), refactoring_type.clone()),
            _ => unreachable!("registry dispatches by task type"),
        };
        let root = ctx.project_root(execution);
        let auto_apply = execution.options.auto_apply;

        ctx.report_progress(execution, 10, "Scanning for opportunities").await;
        let files = resolve_target_files(ctx, &root, target.as_deref()).await?;

        let mut opportunities: Vec<RefactoringOpportunity> = Vec::new();
        let mut contents: Vec<(std::path::PathBuf, String)> = Vec::new();
        for file in &files {
            let content = ctx.fs.read_file(file).await?;
            opportunities.extend(self.detector.detect(file, &content));
            contents.push((file.clone(), content));
        }

        ctx.report_progress(
            execution,
            40,
            &format!("Found {} opportunities", opportunities.len()),
        )
        .await;

        let mut applied_changes: Vec<Value> = Vec::new();
        if auto_apply && !opportunities.is_empty() {
            let flagged: std::collections::HashSet<&str> =
                opportunities.iter().map(|o| o.file_path.as_str()).collect();

            let total = contents.len().max(1);
            for (index, (file, content)) in contents.iter().enumerate() {
                if !flagged.contains(file.display().to_string().as_str()) {
                    continue;
                }
                let progress = 50 + ((index * 40) / total) as u8;
                ctx.report_progress(execution, progress, &format!("Refactoring {}", file.display()))
                    .await;

                let file_opportunities: Vec<&RefactoringOpportunity> = opportunities
                    .iter()
                    .filter(|o| o.file_path == file.display().to_string())
                    .collect();
                let response = ctx
                    .ai
                    .optimize_code(
                        content,
                        &json!({
                            "refactoring_type": refactoring_type,
                            "opportunities": file_opportunities,
                        }),
                        &json!({"model": execution.options.ai_model}),
                    )
                    .await?;

                if let Some(revised) = extract_revised_content(&response) {
                    let backup_path = ctx.fs.create_backup(file).await?;
                    ctx.fs.write_file(file, revised).await?;
                    applied_changes.push(json!({
                        "file": file.display().to_string(),
                        "backup_path": backup_path.display().to_string(),
                    }));
                }
            }
        }

        ctx.report_progress(execution, 100, "Refactoring complete").await;
        Ok(json!({
            "plan": {
                "refactoring_type": refactoring_type,
                "opportunities": opportunities,
            },
            "applied_changes": applied_changes,
            "summary": {
                "files_scanned": files.len(),
                "opportunity_count": opportunities.len(),
                "applied_count": applied_changes.len(),
                "auto_apply": auto_apply,
            },
            "metrics": {
                "duration_ms": execution.elapsed_ms(),
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stubs::{auto_apply_execution_for, execution_for, stub_context};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_refactoring_reports_plan_without_writes() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("lib.rs");
        std::fs::write(&file, "// TODO: clean this up\nfn f() {}\n").unwrap();

        let ctx = stub_context();
        let mut exec = execution_for(
            TaskKind::Refactoring {
                target: Some("lib.rs".to_string()),
                refactoring_type: "cleanup".to_string(),
            },
            temp.path(),
        );

        let result = RefactoringHandler::default().execute(&mut exec, &ctx).await.unwrap();
        assert_eq!(result["summary"]["opportunity_count"], 1);
        assert_eq!(result["summary"]["applied_count"], 0);

        let on_disk = std::fs::read_to_string(&file).unwrap();
        assert!(on_disk.contains("TODO"));
    }

    #[tokio::test]
    async fn test_refactoring_auto_apply_backs_up_and_rewrites() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("lib.rs");
        std::fs::write(&file, "// FIXME: broken\nfn f() {}\n").unwrap();

        let ctx = stub_context();
        let mut exec = auto_apply_execution_for(
            TaskKind::Refactoring {
                target: Some("lib.rs".to_string()),
                refactoring_type: "cleanup".to_string(),
            },
            temp.path(),
        );

        let result = RefactoringHandler::default().execute(&mut exec, &ctx).await.unwrap();
        assert_eq!(result["summary"]["applied_count"], 1);

        let backup_path = result["applied_changes"][0]["backup_path"].as_str().unwrap();
        assert!(std::fs::read_to_string(backup_path).unwrap().contains("FIXME"));
        assert!(std::fs::read_to_string(&file).unwrap().contains("optimized"));
    }

    #[tokio::test]
    async fn test_refactoring_clean_file_yields_empty_plan() {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("lib.rs"), "fn f() {}\n").unwrap();

        let ctx = stub_context();
        let mut exec = execution_for(
            TaskKind::Refactoring {
                target: Some("lib.rs".to_string()),
                refactoring_type: "cleanup".to_string(),
            },
            temp.path(),
        );

        let result = RefactoringHandler::default().execute(&mut exec, &ctx).await.unwrap();
        assert_eq!(result["summary"]["opportunity_count"], 0);
    }
}
