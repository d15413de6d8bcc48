//! Completion watcher: delivers finished tasks to their callback URLs.
//!
//! Two paths feed deliveries: change events under the task namespace, and a
//! periodic sweep that catches anything the event stream missed. Either path
//! first claims the task by compare-and-swap to `Resolving`; only the winner
//! POSTs. A successful (2xx) POST is acknowledged by deleting the task. A
//! failed one leaves the task `Resolving` until `resolving_timeout` passes,
//! after which the sweep claims it again. Delivery is at-least-once.

use std::sync::Arc;
use std::time::Duration;

use conductor_core::config::TaskWatcherSettings;
use conductor_core::keys::{task_key, TASK_ROOT};
use conductor_core::models::now_nanos;
use conductor_core::wire::TaskResponse;
use conductor_core::{Task, TaskState};
use tokio::sync::{broadcast, Semaphore};
use tokio::time;

use crate::desired_lrps::encode;
use crate::store::{ChangeEvent, ChangeKind, Store, StoreError, StoreNode};

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub sweep_interval: Duration,
    pub callback_timeout: Duration,
    pub resolving_timeout: Duration,
    pub restart_delay: Duration,
    pub max_in_flight: usize,
}

impl From<&TaskWatcherSettings> for WatcherConfig {
    fn from(s: &TaskWatcherSettings) -> Self {
        Self {
            sweep_interval: s.sweep_interval(),
            callback_timeout: s.callback_timeout(),
            resolving_timeout: s.resolving_timeout(),
            restart_delay: s.restart_delay(),
            max_in_flight: s.max_in_flight_deliveries.max(1),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self::from(&TaskWatcherSettings::default())
    }
}

pub struct TaskWatcher {
    deliverer: Deliverer,
    config: WatcherConfig,
    shutdown: broadcast::Receiver<()>,
}

/// Everything a spawned delivery needs. Cheap to clone.
#[derive(Clone)]
struct Deliverer {
    store: Arc<dyn Store>,
    http: reqwest::Client,
    permits: Arc<Semaphore>,
    callback_timeout: Duration,
}

impl TaskWatcher {
    pub fn new(
        store: Arc<dyn Store>,
        config: WatcherConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            deliverer: Deliverer {
                store,
                http: reqwest::Client::new(),
                permits: Arc::new(Semaphore::new(config.max_in_flight)),
                callback_timeout: config.callback_timeout,
            },
            config,
            shutdown,
        }
    }

    /// Runs until the shutdown signal fires. Deliveries still in flight at
    /// that point are abandoned.
    pub async fn run(mut self) {
        tracing::info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            max_in_flight = self.config.max_in_flight,
            "task watcher starting"
        );
        let mut sweep = time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            match self.deliverer.store.watch(TASK_ROOT).await {
                Ok(mut watch) => loop {
                    tokio::select! {
                        _ = self.shutdown.recv() => {
                            tracing::info!("task watcher shutting down");
                            return;
                        }
                        _ = sweep.tick() => self.sweep().await,
                        event = watch.next() => match event {
                            Some(Ok(event)) => self.handle_event(event),
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "task watch failed, resubscribing");
                                break;
                            }
                            None => {
                                tracing::info!("task watch closed, resubscribing");
                                break;
                            }
                        },
                    }
                },
                Err(e) => tracing::warn!(error = %e, "failed to subscribe to task changes"),
            }

            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("task watcher shutting down");
                    return;
                }
                _ = time::sleep(self.config.restart_delay) => {}
            }
        }
    }

    fn handle_event(&self, event: ChangeEvent) {
        if !matches!(event.kind, ChangeKind::Created | ChangeKind::Modified) {
            return;
        }
        let task = match serde_json::from_slice::<Task>(&event.node.value) {
            Ok(task) => task,
            Err(e) => {
                tracing::warn!(key = %event.node.key, error = %e, "ignoring undecodable task");
                return;
            }
        };
        if task.awaits_callback() {
            self.deliverer.spawn(task, event.node.index);
        }
    }

    /// List every task and deliver the ones still owed a callback.
    async fn sweep(&self) {
        let nodes = match self.deliverer.store.get_all(TASK_ROOT).await {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::warn!(error = %e, "task sweep failed");
                return;
            }
        };
        let now = now_nanos();
        let timeout = i64::try_from(self.config.resolving_timeout.as_nanos()).unwrap_or(i64::MAX);
        let mut owed = 0usize;
        for StoreNode { key, value, index } in nodes {
            let task = match serde_json::from_slice::<Task>(&value) {
                Ok(task) => task,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "ignoring undecodable task");
                    continue;
                }
            };
            if task.awaits_callback() || task.resolving_is_stale(now, timeout) {
                owed += 1;
                self.deliverer.spawn(task, index);
            }
        }
        tracing::debug!(owed, "task sweep complete");
    }
}

impl Deliverer {
    fn spawn(&self, task: Task, index: u64) {
        let this = self.clone();
        tokio::spawn(async move {
            let Ok(_permit) = this.permits.clone().acquire_owned().await else {
                return;
            };
            if this.claim(&task, index).await {
                this.deliver(task).await;
            }
        });
    }

    /// Move the task to `Resolving` if nobody has touched it since `index`.
    async fn claim(&self, task: &Task, index: u64) -> bool {
        let mut claimed = task.clone();
        claimed.state = TaskState::Resolving;
        claimed.updated_at = now_nanos();
        let value = match encode(&claimed) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(task_guid = %task.task_guid, error = %e, "failed to encode claimed task");
                return false;
            }
        };
        match self
            .store
            .compare_and_swap(&task_key(&task.task_guid), index, value)
            .await
        {
            Ok(_) => true,
            Err(StoreError::Conflict(_) | StoreError::NotFound(_)) => {
                tracing::debug!(task_guid = %task.task_guid, "task claimed elsewhere");
                false
            }
            Err(e) => {
                tracing::warn!(task_guid = %task.task_guid, error = %e, "failed to claim task");
                false
            }
        }
    }

    async fn deliver(&self, mut task: Task) {
        let guid = task.task_guid.clone();
        let url = task.completion_callback_url.clone();
        // A stale claim is redelivered as the completion it was.
        task.state = TaskState::Completed;
        let body = TaskResponse::from(task);

        let result = self
            .http
            .post(url.as_str())
            .timeout(self.callback_timeout)
            .json(&body)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                match self.store.delete(&task_key(&guid)).await {
                    Ok(()) | Err(StoreError::NotFound(_)) => {
                        tracing::info!(task_guid = %guid, "task resolved");
                    }
                    Err(e) => {
                        tracing::warn!(task_guid = %guid, error = %e, "failed to delete resolved task");
                    }
                }
            }
            Ok(resp) => {
                tracing::warn!(task_guid = %guid, url = %url, status = %resp.status(), "completion callback rejected");
            }
            Err(e) => {
                tracing::warn!(task_guid = %guid, url = %url, error = %e, "completion callback failed");
            }
        }
    }
}
