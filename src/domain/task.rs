//! Task domain type
//!
//! A Task is an immutable work order: a typed payload plus an optional
//! project path. Tasks are created by callers and referenced (never
//! mutated) by executions.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

use super::id::generate_id;

/// Task type tag, one per execution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Analysis,
    Script,
    Optimization,
    Security,
    Refactoring,
    Testing,
    Deployment,
    Custom,
}

impl TaskType {
    /// All known task types, in registry order
    pub const ALL: [TaskType; 8] = [
        TaskType::Analysis,
        TaskType::Script,
        TaskType::Optimization,
        TaskType::Security,
        TaskType::Refactoring,
        TaskType::Testing,
        TaskType::Deployment,
        TaskType::Custom,
    ];
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::Script => write!(f, "script"),
            Self::Optimization => write!(f, "optimization"),
            Self::Security => write!(f, "security"),
            Self::Refactoring => write!(f, "refactoring"),
            Self::Testing => write!(f, "testing"),
            Self::Deployment => write!(f, "deployment"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "analysis" => Ok(Self::Analysis),
            "script" => Ok(Self::Script),
            "optimization" => Ok(Self::Optimization),
            "security" => Ok(Self::Security),
            "refactoring" => Ok(Self::Refactoring),
            "testing" => Ok(Self::Testing),
            "deployment" => Ok(Self::Deployment),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Unknown task type: {}", s)),
        }
    }
}

/// Security scan scopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Dependencies,
    Code,
    Configuration,
    #[default]
    Full,
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dependencies => write!(f, "dependencies"),
            Self::Code => write!(f, "code"),
            Self::Configuration => write!(f, "configuration"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Type-specific task payload
///
/// Each variant carries the fields its handler needs, so dispatch is a
/// match on the tag rather than a string switch over a loose data bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    Analysis {
        #[serde(default)]
        target: Option<String>,
    },
    Script {
        script: String,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Optimization {
        #[serde(default)]
        target: Option<String>,
        optimization_type: String,
    },
    Security {
        target: String,
        #[serde(default)]
        scan_type: ScanType,
    },
    Refactoring {
        #[serde(default)]
        target: Option<String>,
        refactoring_type: String,
    },
    Testing {
        test_type: String,
        #[serde(default)]
        test_command: Option<String>,
    },
    Deployment {
        target: String,
        environment: String,
        deployment_type: String,
    },
    Custom {
        custom_script: String,
        #[serde(default)]
        custom_data: Option<Value>,
    },
}

impl TaskKind {
    /// The type tag for this payload
    pub fn task_type(&self) -> TaskType {
        match self {
            Self::Analysis { .. } => TaskType::Analysis,
            Self::Script { .. } => TaskType::Script,
            Self::Optimization { .. } => TaskType::Optimization,
            Self::Security { .. } => TaskType::Security,
            Self::Refactoring { .. } => TaskType::Refactoring,
            Self::Testing { .. } => TaskType::Testing,
            Self::Deployment { .. } => TaskType::Deployment,
            Self::Custom { .. } => TaskType::Custom,
        }
    }
}

/// An immutable work order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: String,

    /// Typed payload, tagged by task type
    #[serde(flatten)]
    pub kind: TaskKind,

    /// Project this task belongs to (overridable by execution options)
    #[serde(default)]
    pub project_path: Option<PathBuf>,
}

impl Task {
    /// Create a new task with a generated ID
    pub fn new(kind: TaskKind) -> Self {
        Self {
            id: generate_id("task"),
            kind,
            project_path: None,
        }
    }

    /// Create with a specific ID (for testing or external callers)
    pub fn with_id(id: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            kind,
            project_path: None,
        }
    }

    /// Builder method to set the project path
    pub fn with_project_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_path = Some(path.into());
        self
    }

    /// The type tag for this task
    pub fn task_type(&self) -> TaskType {
        self.kind.task_type()
    }

    /// Validate the payload shape before any work starts
    ///
    /// Required fields are enforced by the type system; this rejects the
    /// shapes the types cannot (empty strings standing in for missing
    /// values from deserialized payloads).
    pub fn validate(&self) -> Result<(), EngineError> {
        let missing = |field: &str| {
            EngineError::Validation(format!(
                "{} task requires a non-empty '{}'",
                self.task_type(),
                field
            ))
        };

        match &self.kind {
            TaskKind::Analysis { .. } => {}
            TaskKind::Script { script, .. } => {
                if script.trim().is_empty() {
                    return Err(missing("script"));
                }
            }
            TaskKind::Optimization {
                optimization_type, ..
            } => {
                if optimization_type.trim().is_empty() {
                    return Err(missing("optimization_type"));
                }
            }
            TaskKind::Security { target, .. } => {
                if target.trim().is_empty() {
                    return Err(missing("target"));
                }
            }
            TaskKind::Refactoring {
                refactoring_type, ..
            } => {
                if refactoring_type.trim().is_empty() {
                    return Err(missing("refactoring_type"));
                }
            }
            TaskKind::Testing { test_type, .. } => {
                if test_type.trim().is_empty() {
                    return Err(missing("test_type"));
                }
            }
            TaskKind::Deployment {
                target,
                environment,
                deployment_type,
            } => {
                if target.trim().is_empty() {
                    return Err(missing("target"));
                }
                if environment.trim().is_empty() {
                    return Err(missing("environment"));
                }
                if deployment_type.trim().is_empty() {
                    return Err(missing("deployment_type"));
                }
            }
            TaskKind::Custom { custom_script, .. } => {
                if custom_script.trim().is_empty() {
                    return Err(missing("custom_script"));
                }
            }
        }
        Ok(())
    }
}
