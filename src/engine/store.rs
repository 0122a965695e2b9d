//! Execution store
//!
//! The engine's map of tracked executions, behind a trait so a durable
//! backend can replace the in-memory default without touching call sites.
//! State lives only for the process lifetime; loss on restart is an
//! explicit non-goal of this engine.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Execution, ExecutionStatus};

/// Keyed access to execution records
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Fetch a record by execution id
    async fn get(&self, id: &str) -> Option<Execution>;

    /// Insert a new record
    async fn insert(&self, execution: Execution);

    /// Overwrite an existing record (insert if absent)
    async fn update(&self, execution: Execution);

    /// Remove a record, returning it if present
    async fn remove(&self, id: &str) -> Option<Execution>;

    /// All tracked records
    async fn list(&self) -> Vec<Execution>;
}

/// In-memory execution store
#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<HashMap<String, Execution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of executions not yet in a terminal state
    pub async fn active_count(&self) -> usize {
        self.executions
            .read()
            .await
            .values()
            .filter(|e| matches!(e.status, ExecutionStatus::Preparing | ExecutionStatus::Running))
            .count()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn get(&self, id: &str) -> Option<Execution> {
        self.executions.read().await.get(id).cloned()
    }

    async fn insert(&self, execution: Execution) {
        self.executions.write().await.insert(execution.id.clone(), execution);
    }

    async fn update(&self, execution: Execution) {
        self.executions.write().await.insert(execution.id.clone(), execution);
    }

    async fn remove(&self, id: &str) -> Option<Execution> {
        self.executions.write().await.remove(id)
    }

    async fn list(&self) -> Vec<Execution> {
        self.executions.read().await.values().cloned().collect()
    }
}
