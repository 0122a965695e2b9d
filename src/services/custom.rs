//! Custom script task handler
//!
//! Runs a user-supplied shell script with `CUSTOM_DATA` in its
//! environment and JSON-parses stdout when it looks like JSON.

use std::collections::HashMap;

use async_trait::async_trait;
use eyre::Result;
use serde_json::{Value, json};

use crate::domain::{Execution, TaskKind, TaskType};
use crate::error::EngineError;

use super::registry::{HandlerContext, TaskTypeHandler};
use super::traits::ScriptRequest;

pub struct CustomHandler;

/// Parse stdout as JSON, falling back to the raw string
fn parse_output(stdout: &str) -> Value {
    match serde_json::from_str(stdout.trim()) {
        Ok(value) => value,
        Err(_) => Value::String(stdout.to_string()),
    }
}

#[async_trait]
impl TaskTypeHandler for CustomHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Custom
    }

    async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value> {
        let (custom_script, custom_data) = match &execution.task.kind {
            TaskKind::Custom {
                custom_script,
                custom_data,
            } => (custom_script.clone(), custom_data.clone()),
            _ => unreachable!("registry dispatches by task type"),
        };
        let root = ctx.project_root(execution);

        ctx.report_progress(execution, 10, "Preparing custom script").await;
        let mut env = HashMap::new();
        if let Some(data) = &custom_data {
            env.insert("CUSTOM_DATA".to_string(), serde_json::to_string(data)?);
        }

        ctx.report_progress(execution, 30, "Running custom script").await;
        let output = ctx
            .script
            .execute_script(
                &custom_script,
                ScriptRequest::new()
                    .cwd(&root)
                    .env(env)
                    .timeout(execution.options.timeout()),
            )
            .await?;

        if !output.succeeded() {
            return Err(EngineError::ScriptFailed {
                exit_code: output.exit_code,
                stderr: output.error,
            }
            .into());
        }

        ctx.report_progress(execution, 90, "Parsing script output").await;
        Ok(json!({
            "output": parse_output(&output.output),
            "error": output.error,
            "exit_code": output.exit_code,
            "summary": {
                "had_custom_data": custom_data.is_some(),
            },
            "metrics": {
                "duration_ms": execution.elapsed_ms(),
                "script_duration_ms": output.duration_ms,
            },
        }))
    }
}
