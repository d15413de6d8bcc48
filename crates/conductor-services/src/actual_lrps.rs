//! Read-only view of actual LRPs reported by cells.

use std::sync::Arc;

use conductor_core::keys::{actual_lrp_process_dir, ACTUAL_LRP_ROOT};
use conductor_core::{is_valid_guid, ActualLrp};

use crate::error::ServiceError;
use crate::store::Store;

#[derive(Clone)]
pub struct ActualLrpService {
    store: Arc<dyn Store>,
}

impl ActualLrpService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<ActualLrp>, ServiceError> {
        self.read_under(ACTUAL_LRP_ROOT).await
    }

    pub async fn list_by_domain(&self, domain: &str) -> Result<Vec<ActualLrp>, ServiceError> {
        let mut lrps = self.list().await?;
        lrps.retain(|lrp| lrp.domain == domain);
        Ok(lrps)
    }

    /// Every reported instance of one process, ordered by index.
    pub async fn list_by_process_guid(
        &self,
        process_guid: &str,
    ) -> Result<Vec<ActualLrp>, ServiceError> {
        if process_guid.is_empty() {
            return Err(ServiceError::MissingIdentifier("process_guid"));
        }
        // No instance can be stored under a guid that is not a single key segment.
        if !is_valid_guid(process_guid) {
            return Ok(Vec::new());
        }
        let mut lrps = self.read_under(&actual_lrp_process_dir(process_guid)).await?;
        lrps.sort_by_key(|lrp| lrp.index);
        Ok(lrps)
    }

    async fn read_under(&self, prefix: &str) -> Result<Vec<ActualLrp>, ServiceError> {
        let nodes = self.store.get_all(prefix).await?;
        Ok(crate::decode_skipping_bad(nodes, "actual lrp"))
    }
}
