//! Security task handler
//!
//! Runs the automated scan scopes selected by the task's scan type, then
//! hands the collected data to the AI provider for a risk assessment.
//! The code and configuration sub-scans are stubs by contract: they back
//! a pluggable scanner seam and return empty findings today, but the
//! `{dependencies, code, configuration}` keys always exist in the result.

use async_trait::async_trait;
use eyre::Result;
use serde_json::{Value, json};

use crate::domain::{Execution, ScanType, TaskKind, TaskType};

use super::registry::{HandlerContext, TaskTypeHandler};

pub struct SecurityHandler;

impl SecurityHandler {
    /// Dependency scope: surfaces declared dependencies for assessment
    async fn scan_dependencies(ctx: &HandlerContext, root: &std::path::Path) -> Vec<Value> {
        match ctx.fs.dependency_info(root).await {
            Ok(info) => info["dependencies"].as_array().cloned().unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    /// Code scope: placeholder for a pluggable static scanner
    fn scan_code() -> Vec<Value> {
        Vec::new()
    }

    /// Configuration scope: placeholder for a pluggable config scanner
    fn scan_configuration() -> Vec<Value> {
        Vec::new()
    }
}

#[async_trait]
impl TaskTypeHandler for SecurityHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Security
    }

    async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value> {
        let (target, scan_type) = match &execution.task.kind {
            TaskKind::Security { target, scan_type } => (target.clone(), *scan_type),
            _ => unreachable!("registry dispatches by task type"),
        };
        let root = ctx.project_root(execution);

        ctx.report_progress(execution, 10, "Running automated checks").await;
        let dependencies = if matches!(scan_type, ScanType::Dependencies | ScanType::Full) {
            Self::scan_dependencies(ctx, &root).await
        } else {
            Vec::new()
        };
        let code = if matches!(scan_type, ScanType::Code | ScanType::Full) {
            Self::scan_code()
        } else {
            Vec::new()
        };
        let configuration = if matches!(scan_type, ScanType::Configuration | ScanType::Full) {
            Self::scan_configuration()
        } else {
            Vec::new()
        };

        let automated_checks = json!({
            "dependencies": dependencies,
            "code": code,
            "configuration": configuration,
        });

        ctx.report_progress(execution, 60, "Requesting AI risk assessment").await;
        let assessment = ctx
            .ai
            .security_analysis(
                &json!({
                    "target": target,
                    "scan_type": scan_type.to_string(),
                    "automated_checks": automated_checks,
                }),
                &json!({"model": execution.options.ai_model}),
            )
            .await?;

        ctx.report_progress(execution, 100, "Security scan complete").await;
        let finding_count = automated_checks["dependencies"].as_array().map(|a| a.len()).unwrap_or(0)
            + automated_checks["code"].as_array().map(|a| a.len()).unwrap_or(0)
            + automated_checks["configuration"].as_array().map(|a| a.len()).unwrap_or(0);

        Ok(json!({
            "automated_checks": automated_checks,
            "ai_assessment": assessment,
            "summary": {
                "target": target,
                "scan_type": scan_type.to_string(),
                "finding_count": finding_count,
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
    use crate::services::stubs::{execution_for, stub_context};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_dependencies_scan_keeps_stub_scopes_empty() {
        let temp = tempdir().unwrap();
        std::fs::write(
            temp.path().join("package.json"),
            r#"{"dependencies":{"express":"^4.0.0"}}"#,
        )
        .unwrap();

        let ctx = stub_context();
        let mut exec = execution_for(
            TaskKind::Security {
                target: "api".to_string(),
                scan_type: ScanType::Dependencies,
            },
            temp.path(),
        );

        let result = SecurityHandler.execute(&mut exec, &ctx).await.unwrap();
        let checks = &result["automated_checks"];

        // All three keys must exist; only dependencies is populated
        assert_eq!(checks["dependencies"].as_array().unwrap().len(), 1);
        assert!(checks["code"].as_array().unwrap().is_empty());
        assert!(checks["configuration"].as_array().unwrap().is_empty());
        assert_eq!(result["summary"]["finding_count"], 1);
    }

    #[tokio::test]
    async fn test_dependencies_scan_empty_project_keeps_key() {
        let temp = tempdir().unwrap();
        let ctx = stub_context();
        let mut exec = execution_for(
            TaskKind::Security {
                target: "api".to_string(),
                scan_type: ScanType::Dependencies,
            },
            temp.path(),
        );

        let result = SecurityHandler.execute(&mut exec, &ctx).await.unwrap();
        // Stub behavior may yield nothing, but the key must exist
        assert!(result["automated_checks"]["dependencies"].is_array());
    }

    #[tokio::test]
    async fn test_full_scan_includes_assessment() {
        let temp = tempdir().unwrap();
        let ctx = stub_context();
        let mut exec = execution_for(
            TaskKind::Security {
                target: "api".to_string(),
                scan_type: ScanType::Full,
            },
            temp.path(),
        );

        let result = SecurityHandler.execute(&mut exec, &ctx).await.unwrap();
        assert_eq!(result["ai_assessment"]["risk"], "low");
        assert_eq!(result["summary"]["scan_type"], "full");
    }
}
