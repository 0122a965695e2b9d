//! Testing task handler
//!
//! Runs the project's test command through the script executor and
//! parses the output with best-effort regexes. Unparsable output yields
//! all-zero counts rather than an error; test failures are findings, not
//! execution failures.

use std::sync::LazyLock;

use async_trait::async_trait;
use eyre::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{Execution, TaskKind, TaskType};

use super::registry::{HandlerContext, TaskTypeHandler};
use super::traits::ScriptRequest;

static TOTAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s+total").expect("static pattern"));
static PASSED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s+passed").expect("static pattern"));
static FAILED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s+failed").expect("static pattern"));
static SKIPPED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s+skipped").expect("static pattern"));
static COVERAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)coverage\D*?([\d.]+)\s*%").expect("static pattern"));

/// Parsed test-runner counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCounts {
    pub total_tests: u64,
    pub passed_tests: u64,
    pub failed_tests: u64,
    pub skipped_tests: u64,
    pub coverage_percent: Option<f64>,
}

/// Best-effort parse of common test-runner output shapes
pub fn parse_test_output(output: &str) -> TestCounts {
    let capture = |re: &Regex| {
        re.captures(output)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    TestCounts {
        total_tests: capture(&TOTAL_RE),
        passed_tests: capture(&PASSED_RE),
        failed_tests: capture(&FAILED_RE),
        skipped_tests: capture(&SKIPPED_RE),
        coverage_percent: COVERAGE_RE
            .captures(output)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok()),
    }
}

/// Pick a test command from recognizable project markers
async fn detect_test_command(ctx: &HandlerContext, root: &std::path::Path) -> String {
    if ctx.fs.exists(&root.join("package.json")).await {
        "npm test".to_string()
    } else if ctx.fs.exists(&root.join("Cargo.toml")).await {
        "cargo test".to_string()
    } else if ctx.fs.exists(&root.join("pyproject.toml")).await
        || ctx.fs.exists(&root.join("pytest.ini")).await
    {
        "pytest".to_string()
    } else {
        "make test".to_string()
    }
}

pub struct TestingHandler;

#[async_trait]
impl TaskTypeHandler for TestingHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Testing
    }

    async fn execute(&self, execution: &mut Execution, ctx: &HandlerContext) -> Result<Value> {
        let (test_type, test_command) = match &execution.task.kind {
            TaskKind::Testing {
                test_type,
                test_command,
            } => (test_type.clone(), test_command.clone()),
            _ => unreachable!("registry dispatches by task type"),
        };
        let root = ctx.project_root(execution);

        ctx.report_progress(execution, 10, "Resolving test command").await;
        let command = match test_command {
            Some(command) => command,
            None => detect_test_command(ctx, &root).await,
        };

        ctx.report_progress(execution, 30, &format!("Running: {}", command)).await;
        let request = ScriptRequest::new()
            .cwd(&root)
            .timeout(execution.options.timeout());
        // Failing tests exit non-zero; that is a finding, not an error
        let output = ctx.script.execute_script(&command, request).await?;

        ctx.report_progress(execution, 70, "Parsing test output").await;
        let combined = format!("{}\n{}", output.output, output.error);
        let counts = parse_test_output(&combined);
        debug!(execution_id = %execution.id, ?counts, "Parsed test output");

        ctx.report_progress(execution, 85, "Analyzing results").await;
        let analysis = ctx
            .ai
            .analyze_test_results(
                &json!({
                    "counts": counts,
                    "exit_code": output.exit_code,
                    "test_type": test_type,
                }),
                &json!({"model": execution.options.ai_model}),
            )
            .await?;

        ctx.report_progress(execution, 100, "Testing complete").await;
        Ok(json!({
            "results": counts,
            "exit_code": output.exit_code,
            "analysis": analysis,
            "summary": {
                "test_type": test_type,
                "command": command,
                "total": counts.total_tests,
                "passed": counts.passed_tests,
                "failed": counts.failed_tests,
                "skipped": counts.skipped_tests,
                "all_passed": counts.failed_tests == 0 && output.exit_code == 0,
            },
            "metrics": {
                "duration_ms": execution.elapsed_ms(),
                "test_duration_ms": output.duration_ms,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::stubs::{execution_for, stub_context};
    use tempfile::tempdir;

    #[test]
    fn test_parse_common_shape() {
        let output = "Tests: 10 total\nPass: 8 passed\nFail: 2 failed";
        let counts = parse_test_output(output);
        assert_eq!(
            counts,
            TestCounts {
                total_tests: 10,
                passed_tests: 8,
                failed_tests: 2,
                skipped_tests: 0,
                coverage_percent: None,
            }
        );
    }

    #[test]
    fn test_parse_with_skipped_and_coverage() {
        let output = "Tests: 20 total, 17 passed, 1 failed, 2 skipped\nCoverage: 84.5%";
        let counts = parse_test_output(output);
        assert_eq!(counts.total_tests, 20);
        assert_eq!(counts.skipped_tests, 2);
        assert_eq!(counts.coverage_percent, Some(84.5));
    }

    #[test]
    fn test_parse_unparsable_yields_zeros() {
        let counts = parse_test_output("nothing useful here");
        assert_eq!(counts, TestCounts::default());
    }

    #[tokio::test]
    async fn test_testing_handler_runs_explicit_command() {
        let temp = tempdir().unwrap();
        let ctx = stub_context();
        let mut exec = execution_for(
            TaskKind::Testing {
                test_type: "unit".to_string(),
                test_command: Some("echo 'Tests: 3 total, 3 passed, 0 failed'".to_string()),
            },
            temp.path(),
        );

        let result = TestingHandler.execute(&mut exec, &ctx).await.unwrap();
        assert_eq!(result["summary"]["total"], 3);
        assert_eq!(result["summary"]["all_passed"], true);
        assert!(result["analysis"]["verdict"].is_string());
    }

    #[tokio::test]
    async fn test_testing_handler_failing_tests_still_complete() {
        let temp = tempdir().unwrap();
        let ctx = stub_context();
        let mut exec = execution_for(
            TaskKind::Testing {
                test_type: "unit".to_string(),
                test_command: Some("echo 'Tests: 2 total, 1 passed, 1 failed'; exit 1".to_string()),
            },
            temp.path(),
        );

        let result = TestingHandler.execute(&mut exec, &ctx).await.unwrap();
        assert_eq!(result["summary"]["failed"], 1);
        assert_eq!(result["summary"]["all_passed"], false);
        assert_eq!(result["exit_code"], 1);
    }

    #[tokio::test]
    async fn test_detect_command_from_markers() {
        let temp = tempdir().unwrap();
        let ctx = stub_context();

        assert_eq!(detect_test_command(&ctx, temp.path()).await, "make test");

        std::fs::write(temp.path().join("Cargo.toml"), "[package]").unwrap();
        assert_eq!(detect_test_command(&ctx, temp.path()).await, "cargo test");

        std::fs::write(temp.path().join("package.json"), "{}").unwrap();
        assert_eq!(detect_test_command(&ctx, temp.path()).await, "npm test");
    }
}
