//! Per-project queue pump
//!
//! A single scheduling loop over every project queue. Each tick enforces
//! the core invariant: at most one running item per project, promoted in
//! arrival order. A running item past the stuck threshold no longer
//! blocks its project and is reclaimed (re-promoted) instead.
//!
//! The loop wakes on three conditions: the poll interval, an internal
//! nudge after an item settles, and queue-item-added events on the bus.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Notify, broadcast};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::PumpConfig;
use crate::domain::{ExecutionOptions, QueueItem, QueueItemPatch, QueueItemStatus};
use crate::events::{EngineEvent, EventBus};
use crate::services::traits::{IdeManager, TaskRunner};

use super::store::QueueStore;

/// The queue pump
///
/// Cheap to clone; all state is behind shared handles.
#[derive(Clone)]
pub struct TaskProcessor {
    queue: Arc<dyn QueueStore>,
    runner: Arc<dyn TaskRunner>,
    ide: Option<Arc<dyn IdeManager>>,
    events: Option<Arc<EventBus>>,
    config: PumpConfig,
    notify: Arc<Notify>,
}

impl TaskProcessor {
    pub fn new(queue: Arc<dyn QueueStore>, runner: Arc<dyn TaskRunner>, config: PumpConfig) -> Self {
        Self {
            queue,
            runner,
            ide: None,
            events: None,
            config,
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn with_ide(mut self, ide: Arc<dyn IdeManager>) -> Self {
        self.ide = Some(ide);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: EngineEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    /// Submit an item to a project's queue and nudge the loop
    pub async fn add_item(&self, project_id: &str, item: QueueItem) -> String {
        let item_id = item.id.clone();
        self.queue.enqueue(project_id, item).await;
        debug!(project_id, item_id = %item_id, "Queue item added");
        self.emit(EngineEvent::QueueItemAdded {
            project_id: project_id.to_string(),
            item_id: item_id.clone(),
        });
        self.notify.notify_one();
        item_id
    }

    /// Run the scheduling loop until shutdown
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut bus_rx = self.events.as_ref().map(|e| e.subscribe());

        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            stuck_threshold_secs = self.config.stuck_threshold_secs,
            "Queue pump started"
        );
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = self.notify.notified() => self.tick().await,
                _ = Self::item_added(&mut bus_rx) => self.tick().await,
                _ = shutdown.recv() => {
                    info!("Queue pump shutting down");
                    break;
                }
            }
        }
    }

    /// Wait for the next queue-item-added event; pends forever without a bus
    async fn item_added(rx: &mut Option<broadcast::Receiver<EngineEvent>>) {
        let Some(rx) = rx else {
            return std::future::pending().await;
        };
        loop {
            match rx.recv().await {
                Ok(EngineEvent::QueueItemAdded { .. }) => return,
                Ok(_) => continue,
                // Missed events are no worse than a poll-interval delay
                Err(broadcast::error::RecvError::Lagged(_)) => return,
                Err(broadcast::error::RecvError::Closed) => return std::future::pending().await,
            }
        }
    }

    /// One scheduling pass over every project queue
    pub async fn tick(&self) {
        for project_id in self.queue.project_ids().await {
            self.tick_project(&project_id).await;
        }
    }

    /// Promote at most one item for a project
    async fn tick_project(&self, project_id: &str) {
        let items = self.queue.items(project_id).await;
        let threshold = self.config.stuck_threshold();

        // A healthy running item blocks the project
        let busy = items
            .iter()
            .any(|i| i.status == QueueItemStatus::Running && !i.is_stuck(threshold));
        if busy {
            return;
        }

        // Stuck items outrank queued ones; both resolve in arrival order
        let candidate = items
            .iter()
            .find(|i| i.is_stuck(threshold))
            .or_else(|| items.iter().find(|i| i.is_promotable()));
        let Some(item) = candidate else {
            return;
        };

        if item.is_stuck(threshold) {
            warn!(project_id, item_id = %item.id, "Reclaiming stuck item");
        }

        // Persist the running transition before spawning so a concurrent
        // tick cannot promote a second item for this project
        let Some(item) = self
            .queue
            .update_item(project_id, &item.id, QueueItemPatch::running())
            .await
        else {
            return;
        };

        let options = self.runner_options(project_id, &item).await;
        info!(project_id, item_id = %item.id, task_id = %item.context.task_id, "Promoting queue item");

        let pump = self.clone();
        let project = project_id.to_string();
        tokio::spawn(async move {
            pump.run_item(&project, item, options).await;
        });
    }

    /// Merge the runner options for a promoted item
    ///
    /// Layers in the project id, the resolved project path, any discovered
    /// IDE, and the item's prior-step outputs.
    async fn runner_options(&self, project_id: &str, item: &QueueItem) -> ExecutionOptions {
        let mut options = item.options.execution.clone();
        options.project_id = Some(project_id.to_string());
        options.project_path = item
            .context
            .project_path
            .clone()
            .or(options.project_path)
            .or_else(|| std::env::current_dir().ok().or_else(|| Some(PathBuf::from("."))));

        if let Some(manager) = &self.ide {
            let ide = match manager.active_ide().await {
                Some(ide) => Some(ide),
                None => manager.available_ides().await.into_iter().next(),
            };
            if let Some(ide) = ide {
                if let Ok(value) = serde_json::to_value(&ide) {
                    options.extra.insert("ide".to_string(), value);
                }
            }
        }

        for (key, value) in &item.context.extra {
            options.extra.entry(key.clone()).or_insert_with(|| value.clone());
        }
        options
    }

    /// Run a promoted item to settlement and persist the outcome
    async fn run_item(&self, project_id: &str, item: QueueItem, options: ExecutionOptions) {
        match self.runner.run(&item.context.task_id, options).await {
            Ok(result) => {
                self.queue
                    .update_item(project_id, &item.id, QueueItemPatch::completed(result))
                    .await;
                info!(project_id, item_id = %item.id, "Queue item completed");
                self.emit(EngineEvent::QueueItemCompleted {
                    project_id: project_id.to_string(),
                    item_id: item.id.clone(),
                });
            }
            Err(e) => {
                self.queue
                    .update_item(project_id, &item.id, QueueItemPatch::failed(e.to_string()))
                    .await;
                warn!(project_id, item_id = %item.id, error = %e, "Queue item failed");
                self.emit(EngineEvent::QueueItemFailed {
                    project_id: project_id.to_string(),
                    item_id: item.id.clone(),
                    message: e.to_string(),
                });
            }
        }

        // Follow-up tick so the next item in this project promotes without
        // waiting out the poll interval
        tokio::time::sleep(self.config.retick_delay()).await;
        self.notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pump::store::InMemoryQueueStore;
    use crate::services::traits::IdeInstance;
    use async_trait::async_trait;
    use chrono::Utc;
    use eyre::Result;
    use serde_json::{Value, json};
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Runner that records invocations and optionally stalls
    struct RecordingRunner {
        calls: Mutex<Vec<(String, ExecutionOptions)>>,
        delay: Duration,
        fail: bool,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                delay: Duration::from_millis(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        async fn call_count(&self) -> usize {
            self.calls.lock().await.len()
        }
    }

    #[async_trait]
    impl TaskRunner for RecordingRunner {
        async fn run(&self, task_id: &str, options: ExecutionOptions) -> Result<Value> {
            self.calls.lock().await.push((task_id.to_string(), options));
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(eyre::eyre!("runner exploded"))
            } else {
                Ok(json!({"ran": task_id}))
            }
        }
    }

    fn fast_config() -> PumpConfig {
        PumpConfig {
            poll_interval_secs: 3600,
            stuck_threshold_secs: 30,
            retick_delay_ms: 1,
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_tick_promotes_one_item_per_project() {
        let queue = Arc::new(InMemoryQueueStore::new());
        let runner = Arc::new(RecordingRunner {
            delay: Duration::from_secs(5),
            ..RecordingRunner::new()
        });
        let pump = TaskProcessor::new(queue.clone(), runner.clone(), fast_config());

        pump.add_item("p1", QueueItem::new("task-a")).await;
        pump.add_item("p1", QueueItem::new("task-b")).await;

        pump.tick().await;
        settle().await;

        // Only the head of the queue promoted; the second waits
        assert_eq!(runner.call_count().await, 1);
        let items = queue.items("p1").await;
        assert_eq!(items[0].status, QueueItemStatus::Running);
        assert_eq!(items[1].status, QueueItemStatus::Queued);

        // A running item still within threshold blocks further promotion
        pump.tick().await;
        settle().await;
        assert_eq!(runner.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_projects_run_in_parallel() {
        let queue = Arc::new(InMemoryQueueStore::new());
        let runner = Arc::new(RecordingRunner {
            delay: Duration::from_secs(5),
            ..RecordingRunner::new()
        });
        let pump = TaskProcessor::new(queue.clone(), runner.clone(), fast_config());

        pump.add_item("p1", QueueItem::new("task-a")).await;
        pump.add_item("p2", QueueItem::new("task-b")).await;

        pump.tick().await;
        settle().await;
        assert_eq!(runner.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_fifo_settlement_chain() {
        let queue = Arc::new(InMemoryQueueStore::new());
        let runner = Arc::new(RecordingRunner::new());
        let pump = TaskProcessor::new(queue.clone(), runner.clone(), fast_config());

        let first = pump.add_item("p1", QueueItem::new("task-a")).await;
        let second = pump.add_item("p1", QueueItem::new("task-b")).await;

        // First tick promotes task-a; it settles instantly, the follow-up
        // nudge is deferred, so tick again for task-b
        pump.tick().await;
        settle().await;
        pump.tick().await;
        settle().await;

        let calls = runner.calls.lock().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "task-a");
        assert_eq!(calls[1].0, "task-b");
        drop(calls);

        let items = queue.items("p1").await;
        let a = items.iter().find(|i| i.id == first).unwrap();
        let b = items.iter().find(|i| i.id == second).unwrap();
        assert_eq!(a.status, QueueItemStatus::Completed);
        assert_eq!(b.status, QueueItemStatus::Completed);
        // Strict serialization: the second started after the first finished
        assert!(b.started_at.unwrap() >= a.completed_at.unwrap());
    }

    #[tokio::test]
    async fn test_stuck_item_is_reclaimed() {
        let queue = Arc::new(InMemoryQueueStore::new());
        let runner = Arc::new(RecordingRunner::new());
        let pump = TaskProcessor::new(queue.clone(), runner.clone(), fast_config());

        let mut stuck = QueueItem::new("task-stuck");
        stuck.status = QueueItemStatus::Running;
        stuck.started_at = Some(Utc::now() - chrono::Duration::seconds(60));
        queue.enqueue("p1", stuck).await;
        queue.enqueue("p1", QueueItem::new("task-waiting")).await;

        pump.tick().await;
        settle().await;

        // The stuck item was re-promoted ahead of the queued one
        let calls = runner.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "task-stuck");
    }

    #[tokio::test]
    async fn test_failed_run_persists_error() {
        let queue = Arc::new(InMemoryQueueStore::new());
        let runner = Arc::new(RecordingRunner::failing());
        let pump = TaskProcessor::new(queue.clone(), runner, fast_config());

        let id = pump.add_item("p1", QueueItem::new("task-a")).await;
        pump.tick().await;
        settle().await;

        let items = queue.items("p1").await;
        let item = items.iter().find(|i| i.id == id).unwrap();
        assert_eq!(item.status, QueueItemStatus::Failed);
        assert!(item.error.as_deref().unwrap().contains("runner exploded"));
        assert!(item.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_manual_items_are_not_promoted() {
        let queue = Arc::new(InMemoryQueueStore::new());
        let runner = Arc::new(RecordingRunner::new());
        let pump = TaskProcessor::new(queue.clone(), runner.clone(), fast_config());

        pump.add_item("p1", QueueItem::new("task-manual").manual()).await;
        pump.tick().await;
        settle().await;

        assert_eq!(runner.call_count().await, 0);
        assert_eq!(queue.items("p1").await[0].status, QueueItemStatus::Queued);
    }

    struct OneIde;

    #[async_trait]
    impl IdeManager for OneIde {
        async fn active_ide(&self) -> Option<IdeInstance> {
            None
        }

        async fn available_ides(&self) -> Vec<IdeInstance> {
            vec![IdeInstance {
                name: "editor".to_string(),
                workspace_path: None,
                active: false,
            }]
        }
    }

    #[tokio::test]
    async fn test_runner_options_carry_context() {
        let queue = Arc::new(InMemoryQueueStore::new());
        let runner = Arc::new(RecordingRunner::new());
        let pump =
            TaskProcessor::new(queue.clone(), runner.clone(), fast_config()).with_ide(Arc::new(OneIde));

        let mut item = QueueItem::new("task-a").with_project_path("/tmp/project");
        item.context.extra.insert("prior_step".to_string(), json!({"ok": true}));
        pump.add_item("p1", item).await;
        pump.tick().await;
        settle().await;

        let calls = runner.calls.lock().await;
        let (_, options) = &calls[0];
        assert_eq!(options.project_id.as_deref(), Some("p1"));
        assert_eq!(options.project_path.as_deref(), Some(std::path::Path::new("/tmp/project")));
        // Falls back to the first available IDE when none is active
        assert_eq!(options.extra["ide"]["name"], "editor");
        assert_eq!(options.extra["prior_step"]["ok"], true);
    }
}
