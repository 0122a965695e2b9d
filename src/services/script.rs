//! Script task handler
//!
//! Runs a caller-supplied shell command through the script executor with
//! the execution's timeout and an environment built from the process
//! environment plus task-specific overrides.

use std::collections::HashMap;

use async_trait::async_trait;
use eyre::Result;
use serde_json::{Value, json};

use crate::domain::{Execution, TaskKind, TaskType};
use crate::error::EngineError;

use super::registry::{HandlerContext, TaskTypeHandler};
use super::traits::ScriptRequest;

pub struct ScriptHandler;

#[async_trait]
impl TaskTypeHandler for ScriptHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Script
    }

    async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value> {
        let (script, task_env) = match &execution.task.kind {
            TaskKind::Script { script, env } => (script.clone(), env.clone()),
            _ => unreachable!("registry dispatches by task type"),
        };
        let root = ctx.project_root(execution);

        ctx.report_progress(execution, 20, "Preparing script environment").await;
        let mut env: HashMap<String, String> = std::env::vars().collect();
        env.extend(task_env);
        if let Some(environment) = &execution.options.environment {
            env.insert("TASK_ENVIRONMENT".to_string(), environment.clone());
        }

        ctx.report_progress(execution, 50, "Running script").await;
        let request = ScriptRequest::new()
            .cwd(&root)
            .env(env)
            .timeout(execution.options.timeout());
        let output = ctx.script.execute_script(&script, request).await?;

        if !output.succeeded() {
            return Err(EngineError::ScriptFailed {
                exit_code: output.exit_code,
                stderr: output.error,
            }
            .into());
        }

        ctx.report_progress(execution, 100, "Script finished").await;
        Ok(json!({
            "output": output.output,
            "error": output.error,
            "exit_code": output.exit_code,
            "summary": {
                "succeeded": true,
            },
            "metrics": {
                "duration_ms": execution.elapsed_ms(),
                "script_duration_ms": output.duration_ms,
            },
        }))
    }
}
