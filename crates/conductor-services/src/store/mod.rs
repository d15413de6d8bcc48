//! Store facade: key/value access to the external coordination store.
//!
//! Every durable entity lives behind this trait. Implementations do no
//! retrying; callers decide what a failure means.

mod etcd;
mod memory;

pub use etcd::EtcdStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// A single key with its value and the store's modification index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNode {
    pub key: String,
    pub value: Bytes,
    pub index: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One change under a watched prefix. For `Deleted` the node carries the
/// last known value when the backend reports it, else an empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub node: StoreNode,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),
    #[error("compare-and-swap failed for {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected store response: {0}")]
    Protocol(String),
    #[error("watcher fell behind by {0} events")]
    Lagged(u64),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Stream of change events. Yields `Some(Err(_))` once before ending when
/// the underlying subscription breaks; `None` after that.
pub struct Watch {
    rx: mpsc::Receiver<Result<ChangeEvent, StoreError>>,
}

impl Watch {
    pub fn new(rx: mpsc::Receiver<Result<ChangeEvent, StoreError>>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<Result<ChangeEvent, StoreError>> {
        self.rx.recv().await
    }
}

/// Depth of the per-watch event buffer.
pub(crate) const WATCH_BUFFER: usize = 256;

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<StoreNode, StoreError>;

    /// Every leaf under `prefix`, recursively. A missing prefix is empty.
    async fn get_all(&self, prefix: &str) -> Result<Vec<StoreNode>, StoreError>;

    async fn set(&self, key: &str, value: Bytes) -> Result<StoreNode, StoreError>;

    /// Write `value` only if the key's index is still `prev_index`.
    async fn compare_and_swap(
        &self,
        key: &str,
        prev_index: u64,
        value: Bytes,
    ) -> Result<StoreNode, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Subscribe to changes under `prefix`, starting after the current state.
    async fn watch(&self, prefix: &str) -> Result<Watch, StoreError>;
}

/// True when `key` is `prefix` itself or lives below it.
pub(crate) fn under_prefix(key: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    key == prefix
        || (key.starts_with(prefix) && key.as_bytes().get(prefix.len()) == Some(&b'/'))
}
