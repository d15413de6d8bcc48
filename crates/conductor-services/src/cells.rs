//! Read-only view of cell presences.

use std::sync::Arc;

use conductor_core::keys::CELL_ROOT;
use conductor_core::CellPresence;

use crate::error::ServiceError;
use crate::store::Store;

#[derive(Clone)]
pub struct CellService {
    store: Arc<dyn Store>,
}

impl CellService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<CellPresence>, ServiceError> {
        let nodes = self.store.get_all(CELL_ROOT).await?;
        Ok(crate::decode_skipping_bad(nodes, "cell presence"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use bytes::Bytes;
    use conductor_core::keys::cell_key;

    #[tokio::test]
    async fn lists_cells() {
        let store = MemoryStore::new();
        let svc = CellService::new(Arc::new(store.clone()));
        assert!(svc.list().await.unwrap().is_empty());

        store
            .set(
                &cell_key("cell-1"),
                Bytes::from_static(br#"{"cell_id":"cell-1","stack":"lucid64","rep_address":"http://10.0.0.1:1800"}"#),
            )
            .await
            .unwrap();

        let cells = svc.list().await.unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].stack, "lucid64");
    }
}
