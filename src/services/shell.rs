//! Shell script executor
//!
//! Runs commands through `sh -c` with an enforced wall-clock timeout.
//! Timeouts surface as [`EngineError::Timeout`] and are treated by the
//! engine as ordinary execution failures, not a distinct state.

use std::time::Instant;

use async_trait::async_trait;
use eyre::Result;
use tracing::debug;

use crate::error::EngineError;

use super::traits::{ScriptExecutor, ScriptOutput, ScriptRequest};

/// Script executor backed by the system shell
#[derive(Debug, Default, Clone)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScriptExecutor for ShellExecutor {
    async fn execute_script(&self, command: &str, request: ScriptRequest) -> Result<ScriptOutput> {
        debug!(%command, cwd = ?request.cwd, timeout = ?request.timeout, "ShellExecutor::execute_script");
        let start = Instant::now();

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(cwd) = &request.cwd {
            cmd.current_dir(cwd);
        }
        cmd.envs(&request.env);
        cmd.kill_on_drop(true);

        let output = match request.timeout {
            Some(timeout) => tokio::time::timeout(timeout, cmd.output())
                .await
                .map_err(|_| EngineError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })??,
            None => cmd.output().await?,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let result = ScriptOutput {
            output: String::from_utf8_lossy(&output.stdout).to_string(),
            error: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration_ms,
        };

        debug!(exit_code = result.exit_code, duration_ms, "ShellExecutor: command finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[tokio::test]
    async fn test_execute_success() {
        let executor = ShellExecutor::new();
        let result = executor
            .execute_script("echo ok", ScriptRequest::new())
            .await
            .unwrap();

        assert_eq!(result.exit_code, 0);
        assert!(result.succeeded());
        assert!(result.output.contains("ok"));
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit() {
        let executor = ShellExecutor::new();
        let result = executor
            .execute_script("echo err >&2; exit 3", ScriptRequest::new())
            .await
            .unwrap();

        assert_eq!(result.exit_code, 3);
        assert!(!result.succeeded());
        assert!(result.error.contains("err"));
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let executor = ShellExecutor::new();
        let err = executor
            .execute_script(
                "sleep 10",
                ScriptRequest::new().timeout(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();

        let engine_err = err.downcast_ref::<EngineError>().unwrap();
        assert!(matches!(engine_err, EngineError::Timeout { timeout_ms: 100 }));
    }

    #[tokio::test]
    async fn test_execute_with_env_and_cwd() {
        let temp = tempfile::tempdir().unwrap();
        let executor = ShellExecutor::new();

        let mut env = HashMap::new();
        env.insert("FORGE_TEST_VAR".to_string(), "forged".to_string());

        let result = executor
            .execute_script(
                "echo $FORGE_TEST_VAR; pwd",
                ScriptRequest::new().cwd(temp.path()).env(env),
            )
            .await
            .unwrap();

        assert!(result.output.contains("forged"));
        assert!(result.output.contains(temp.path().file_name().unwrap().to_str().unwrap()));
    }
}
