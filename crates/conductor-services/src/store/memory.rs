//! In-process store. Backs tests and `store.backend = "memory"`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use super::{
    under_prefix, ChangeEvent, ChangeKind, Store, StoreError, StoreNode, Watch, WATCH_BUFFER,
};

const EVENT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct MemoryStore {
    nodes: Arc<DashMap<String, StoreNode>>,
    index: Arc<AtomicU64>,
    events: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            nodes: Arc::new(DashMap::new()),
            index: Arc::new(AtomicU64::new(0)),
            events,
        }
    }

    fn next_index(&self) -> u64 {
        self.index.fetch_add(1, Ordering::SeqCst) + 1
    }

    // No receivers is the common case; the send error is meaningless then.
    fn publish(&self, kind: ChangeKind, node: StoreNode) {
        let _ = self.events.send(ChangeEvent { kind, node });
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<StoreNode, StoreError> {
        self.nodes
            .get(key)
            .map(|n| n.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn get_all(&self, prefix: &str) -> Result<Vec<StoreNode>, StoreError> {
        let mut nodes: Vec<StoreNode> = self
            .nodes
            .iter()
            .filter(|e| under_prefix(e.key(), prefix))
            .map(|e| e.value().clone())
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(nodes)
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<StoreNode, StoreError> {
        // Events go out while the entry is locked so watchers see per-key
        // changes in index order.
        match self.nodes.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                let node = StoreNode {
                    key: key.to_string(),
                    value,
                    index: self.next_index(),
                };
                slot.insert(node.clone());
                self.publish(ChangeKind::Modified, node.clone());
                Ok(node)
            }
            Entry::Vacant(slot) => {
                let node = StoreNode {
                    key: key.to_string(),
                    value,
                    index: self.next_index(),
                };
                slot.insert(node.clone());
                self.publish(ChangeKind::Created, node.clone());
                Ok(node)
            }
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        prev_index: u64,
        value: Bytes,
    ) -> Result<StoreNode, StoreError> {
        match self.nodes.entry(key.to_string()) {
            Entry::Vacant(_) => Err(StoreError::NotFound(key.to_string())),
            Entry::Occupied(mut slot) => {
                if slot.get().index != prev_index {
                    return Err(StoreError::Conflict(key.to_string()));
                }
                let node = StoreNode {
                    key: key.to_string(),
                    value,
                    index: self.next_index(),
                };
                slot.insert(node.clone());
                self.publish(ChangeKind::Modified, node.clone());
                Ok(node)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.nodes.entry(key.to_string()) {
            Entry::Vacant(_) => Err(StoreError::NotFound(key.to_string())),
            Entry::Occupied(slot) => {
                let (_, mut node) = slot.remove_entry();
                node.index = self.next_index();
                self.publish(ChangeKind::Deleted, node);
                Ok(())
            }
        }
    }

    async fn watch(&self, prefix: &str) -> Result<Watch, StoreError> {
        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let prefix = prefix.to_string();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if !under_prefix(&event.node.key, &prefix) {
                            continue;
                        }
                        if tx.send(Ok(event)).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(prefix = %prefix, missed, "memory store watcher lagged");
                        let _ = tx.send(Err(StoreError::Lagged(missed))).await;
                        return;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(Watch::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryStore::new();
        let created = store.set("/v1/task/a", Bytes::from_static(b"1")).await.unwrap();
        assert_eq!(created.index, 1);

        let node = store.get("/v1/task/a").await.unwrap();
        assert_eq!(node.value, Bytes::from_static(b"1"));

        store.delete("/v1/task/a").await.unwrap();
        assert!(store.get("/v1/task/a").await.unwrap_err().is_not_found());
        assert!(store.delete("/v1/task/a").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn get_all_is_recursive_and_empty_when_missing() {
        let store = MemoryStore::new();
        assert!(store.get_all("/v1/actual").await.unwrap().is_empty());

        store.set("/v1/actual/p1/0/i1", Bytes::new()).await.unwrap();
        store.set("/v1/actual/p1/1/i2", Bytes::new()).await.unwrap();
        store.set("/v1/actual/p2/0/i3", Bytes::new()).await.unwrap();
        store.set("/v1/desired/p1", Bytes::new()).await.unwrap();

        assert_eq!(store.get_all("/v1/actual").await.unwrap().len(), 3);
        assert_eq!(store.get_all("/v1/actual/p1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn compare_and_swap_checks_index() {
        let store = MemoryStore::new();
        let node = store.set("/v1/task/a", Bytes::from_static(b"1")).await.unwrap();

        let err = store
            .compare_and_swap("/v1/task/a", node.index + 7, Bytes::from_static(b"2"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let swapped = store
            .compare_and_swap("/v1/task/a", node.index, Bytes::from_static(b"2"))
            .await
            .unwrap();
        assert!(swapped.index > node.index);

        let err = store
            .compare_and_swap("/v1/task/missing", 1, Bytes::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn watch_reports_changes_under_prefix() {
        let store = MemoryStore::new();
        let mut watch = store.watch("/v1/task").await.unwrap();

        store.set("/v1/desired/p1", Bytes::new()).await.unwrap();
        store.set("/v1/task/a", Bytes::from_static(b"1")).await.unwrap();
        store.set("/v1/task/a", Bytes::from_static(b"2")).await.unwrap();
        store.delete("/v1/task/a").await.unwrap();

        let kinds: Vec<ChangeKind> = vec![
            watch.next().await.unwrap().unwrap().kind,
            watch.next().await.unwrap().unwrap().kind,
            watch.next().await.unwrap().unwrap().kind,
        ];
        assert_eq!(
            kinds,
            vec![ChangeKind::Created, ChangeKind::Modified, ChangeKind::Deleted]
        );
    }

    #[tokio::test]
    async fn lagging_watcher_gets_an_error_then_ends() {
        let store = MemoryStore::new();
        let mut watch = store.watch("/v1/task").await.unwrap();

        // Overflow both the broadcast ring and the forwarding buffer.
        for i in 0..(EVENT_CAPACITY + WATCH_BUFFER + 64) {
            store
                .set(&format!("/v1/task/{i}"), Bytes::new())
                .await
                .unwrap();
        }

        let mut saw_error = false;
        while let Some(item) = watch.next().await {
            if let Err(err) = item {
                assert!(matches!(err, StoreError::Lagged(_)));
                saw_error = true;
            }
        }
        assert!(saw_error);
    }
}
