//! Code pattern detection for refactoring
//!
//! Kept behind a trait so the regex heuristics can later be replaced by
//! an AST-based analyzer without touching the orchestration core.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A detected refactoring candidate, ephemeral to one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefactoringOpportunity {
    /// Opportunity kind (long-line, todo-comment, deep-nesting, large-file)
    pub kind: String,

    /// File the opportunity was found in
    pub file_path: String,

    /// 1-based line number, when the opportunity is line-scoped
    pub line: Option<usize>,

    /// Human-readable description
    pub description: String,

    /// Detector confidence, 0.0-1.0
    pub confidence: f64,
}

/// Pluggable opportunity detector
pub trait CodePatternDetector: Send + Sync {
    fn detect(&self, path: &Path, content: &str) -> Vec<RefactoringOpportunity>;
}

/// Line length past which a line is flagged
const LONG_LINE_CHARS: usize = 120;

/// Leading whitespace depth past which nesting is flagged
const DEEP_NESTING_SPACES: usize = 24;

/// File length past which the whole file is flagged
const LARGE_FILE_LINES: usize = 400;

/// Regex-heuristic detector
pub struct RegexPatternDetector {
    todo_marker: Regex,
}

impl RegexPatternDetector {
    pub fn new() -> Self {
        Self {
            todo_marker: Regex::new(r"(?i)\b(TODO|FIXME|HACK|XXX)\b").expect("static pattern"),
        }
    }
}

impl Default for RegexPatternDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl CodePatternDetector for RegexPatternDetector {
    fn detect(&self, path: &Path, content: &str) -> Vec<RefactoringOpportunity> {
        let file_path = path.display().to_string();
        let mut opportunities = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;

            if line.chars().count() > LONG_LINE_CHARS {
                opportunities.push(RefactoringOpportunity {
                    kind: "long-line".to_string(),
                    file_path: file_path.clone(),
                    line: Some(line_no),
                    description: format!("Line exceeds {} characters", LONG_LINE_CHARS),
                    confidence: 0.6,
                });
            }

            if self.todo_marker.is_match(line) {
                opportunities.push(RefactoringOpportunity {
                    kind: "todo-comment".to_string(),
                    file_path: file_path.clone(),
                    line: Some(line_no),
                    description: "Unresolved TODO/FIXME marker".to_string(),
                    confidence: 0.9,
                });
            }

            let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
            if !line.trim().is_empty() && indent >= DEEP_NESTING_SPACES {
                opportunities.push(RefactoringOpportunity {
                    kind: "deep-nesting".to_string(),
                    file_path: file_path.clone(),
                    line: Some(line_no),
                    description: "Deeply nested block, consider extracting".to_string(),
                    confidence: 0.5,
                });
            }
        }

        let line_count = content.lines().count();
        if line_count > LARGE_FILE_LINES {
            opportunities.push(RefactoringOpportunity {
                kind: "large-file".to_string(),
                file_path,
                line: None,
                description: format!("File has {} lines, consider splitting", line_count),
                confidence: 0.7,
            });
        }

        opportunities
    }
}
