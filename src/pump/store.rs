//! Per-project queue store
//!
//! Items are grouped by project id and kept in arrival order; the pump's
//! FIFO guarantee rests on that order being stable. Behind a trait so a
//! durable backend can replace the in-memory default.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{QueueItem, QueueItemPatch};

/// Keyed access to per-project queues
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append an item to a project's queue
    async fn enqueue(&self, project_id: &str, item: QueueItem);

    /// Projects that currently have items
    async fn project_ids(&self) -> Vec<String>;

    /// A project's items, in arrival order
    async fn items(&self, project_id: &str) -> Vec<QueueItem>;

    /// Apply a partial update to one item, returning the updated item
    async fn update_item(
        &self,
        project_id: &str,
        item_id: &str,
        patch: QueueItemPatch,
    ) -> Option<QueueItem>;
}

/// In-memory queue store
#[derive(Default)]
pub struct InMemoryQueueStore {
    queues: RwLock<HashMap<String, Vec<QueueItem>>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn enqueue(&self, project_id: &str, item: QueueItem) {
        self.queues
            .write()
            .await
            .entry(project_id.to_string())
            .or_default()
            .push(item);
    }

    async fn project_ids(&self) -> Vec<String> {
        self.queues.read().await.keys().cloned().collect()
    }

    async fn items(&self, project_id: &str) -> Vec<QueueItem> {
        self.queues
            .read()
            .await
            .get(project_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn update_item(
        &self,
        project_id: &str,
        item_id: &str,
        patch: QueueItemPatch,
    ) -> Option<QueueItem> {
        let mut queues = self.queues.write().await;
        let item = queues
            .get_mut(project_id)?
            .iter_mut()
            .find(|i| i.id == item_id)?;
        patch.apply(item);
        Some(item.clone())
    }
}
