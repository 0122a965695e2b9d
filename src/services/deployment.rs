//! Deployment task handler
//!
//! Four-phase protocol: build, pre-deployment checks, deploy,
//! post-deployment checks. A phase's checks can fail (`passed: false`)
//! without aborting the remaining phases; the final result aggregates
//! all phase outcomes and the caller decides success.

use async_trait::async_trait;
use eyre::Result;
use serde_json::{Value, json};

use crate::domain::{Execution, TaskKind, TaskType};

use super::registry::{HandlerContext, TaskTypeHandler};
use super::traits::ScriptRequest;

/// Build command used when no build system is recognized
const GENERIC_BUILD_COMMAND: &str = "make build || ./build.sh || echo 'No build script found'";

pub struct DeploymentHandler;

impl DeploymentHandler {
    /// Pick a build command from recognizable project markers
    async fn build_command(ctx: &HandlerContext, root: &std::path::Path) -> String {
        if ctx.fs.exists(&root.join("package.json")).await {
            "npm run build".to_string()
        } else if ctx.fs.exists(&root.join("Cargo.toml")).await {
            "cargo build --release".to_string()
        } else if ctx.fs.exists(&root.join("Makefile")).await {
            "make build".to_string()
        } else {
            GENERIC_BUILD_COMMAND.to_string()
        }
    }

    /// Pick a deploy command by deployment type
    fn deploy_command(deployment_type: &str, target: &str, environment: &str) -> String {
        match deployment_type {
            "docker" => "docker compose up -d".to_string(),
            "script" => format!("./deploy.sh {} {}", target, environment),
            other => format!("echo 'deploy type {} for {} ({})'", other, target, environment),
        }
    }
}

#[async_trait]
impl TaskTypeHandler for DeploymentHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Deployment
    }

    async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value> {
        let (target, environment, deployment_type) = match &execution.task.kind {
            TaskKind::Deployment {
                target,
                environment,
                deployment_type,
            } => (target.clone(), environment.clone(), deployment_type.clone()),
            _ => unreachable!("registry dispatches by task type"),
        };
        let root = ctx.project_root(execution);
        let timeout = execution.options.timeout();

        // Phase 1: build
        ctx.report_progress(execution, 10, "Building application").await;
        let build_command = Self::build_command(ctx, &root).await;
        let build_output = ctx
            .script
            .execute_script(&build_command, ScriptRequest::new().cwd(&root).timeout(timeout))
            .await?;
        let build = json!({
            "command": build_command,
            "exit_code": build_output.exit_code,
            "output": build_output.output,
            "passed": build_output.succeeded(),
        });

        // Phase 2: pre-deployment checks; failures recorded, not fatal
        ctx.report_progress(execution, 40, "Running pre-deployment checks").await;
        let pre_checks = json!([
            {"name": "project-path-exists", "passed": ctx.fs.exists(&root).await},
            {"name": "build-succeeded", "passed": build["passed"]},
            {"name": "environment-configured", "passed": (!environment.trim().is_empty())},
        ]);

        // Phase 3: deploy
        ctx.report_progress(execution, 60, &format!("Deploying to {}", environment)).await;
        let deploy_command = Self::deploy_command(&deployment_type, &target, &environment);
        let deploy_output = ctx
            .script
            .execute_script(&deploy_command, ScriptRequest::new().cwd(&root).timeout(timeout))
            .await?;
        let deploy = json!({
            "command": deploy_command,
            "exit_code": deploy_output.exit_code,
            "output": deploy_output.output,
            "passed": deploy_output.succeeded(),
        });

        // Phase 4: post-deployment checks
        ctx.report_progress(execution, 85, "Running post-deployment checks").await;
        let post_checks = json!([
            {"name": "deploy-command-succeeded", "passed": deploy["passed"]},
            {"name": "deploy-output-present", "passed": (!deploy_output.output.trim().is_empty())},
        ]);

        let count_passed = |checks: &Value| {
            checks
                .as_array()
                .map(|a| a.iter().filter(|c| c["passed"] == true).count())
                .unwrap_or(0)
        };
        let count_total = |checks: &Value| checks.as_array().map(|a| a.len()).unwrap_or(0);
        let checks_passed = count_passed(&pre_checks) + count_passed(&post_checks);
        let checks_total = count_total(&pre_checks) + count_total(&post_checks);

        ctx.report_progress(execution, 100, "Deployment protocol complete").await;
        Ok(json!({
            "build": build,
            "pre_checks": pre_checks,
            "deploy": deploy,
            "post_checks": post_checks,
            "summary": {
                "target": target,
                "environment": environment,
                "deployment_type": deployment_type,
                "checks_passed": checks_passed,
                "checks_total": checks_total,
                "all_phases_passed": (build["passed"] == true
                    && deploy["passed"] == true
                    && checks_passed == checks_total),
            },
            "metrics": {
                "duration_ms": execution.elapsed_ms(),
                "build_duration_ms": build_output.duration_ms,
                "deploy_duration_ms": deploy_output.duration_ms,
            },
        }))
    }
}
