//! Conductor integration test harness.
//!
//! Each test boots the whole stack in-process: the HTTP API on an
//! ephemeral port over a memory store, plus the task watcher. Nothing
//! external is needed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;

use conductor_api::{ApiState, ServerOptions};
use conductor_services::store::{MemoryStore, Store};
use conductor_services::{TaskWatcher, WatcherConfig};

mod desired_lrps;
mod task_watcher;

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct Stack {
    pub base_url: String,
    pub store: MemoryStore,
    pub http: reqwest::Client,
    shutdown: broadcast::Sender<()>,
}

impl Stack {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

/// Watcher settings tight enough for tests to observe retries.
pub fn test_watcher_config() -> WatcherConfig {
    WatcherConfig {
        sweep_interval: Duration::from_millis(200),
        callback_timeout: Duration::from_secs(2),
        resolving_timeout: Duration::from_millis(300),
        restart_delay: Duration::from_millis(10),
        max_in_flight: 4,
    }
}

/// Start API and watcher over a fresh memory store.
pub async fn spawn_stack() -> Result<Stack> {
    let store = MemoryStore::new();
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    let (shutdown, _) = broadcast::channel(1);

    let app = conductor_api::router(ApiState::new(Arc::clone(&shared)), &ServerOptions::default());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("failed to bind test listener")?;
    let addr: SocketAddr = listener.local_addr()?;
    let mut api_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = api_shutdown.recv().await;
            })
            .await;
    });

    tokio::spawn(TaskWatcher::new(shared, test_watcher_config(), shutdown.subscribe()).run());

    Ok(Stack {
        base_url: format!("http://{addr}"),
        store,
        http: reqwest::Client::new(),
        shutdown,
    })
}

/// Poll `cond` until it holds or roughly `millis` pass.
pub async fn eventually<F, Fut>(millis: u64, mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(millis);
    while tokio::time::Instant::now() < deadline {
        if cond().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond().await
}
