//! Desired LRP operations over the store.
//!
//! Requests are served concurrently and nothing here holds a lock across a
//! store call. `update` is read-modify-write: two updates to the same guid
//! race and the later write wins, silently discarding the other's fields.

use std::sync::Arc;

use bytes::Bytes;
use conductor_core::keys::{desired_lrp_key, DESIRED_LRP_ROOT};
use conductor_core::{is_valid_guid, DesiredLrp, DesiredLrpUpdate};

use crate::error::ServiceError;
use crate::store::{Store, StoreError, StoreNode};

#[derive(Clone)]
pub struct DesiredLrpService {
    store: Arc<dyn Store>,
}

impl DesiredLrpService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Validate and write. An existing record with the same guid is replaced.
    pub async fn create(&self, lrp: DesiredLrp) -> Result<(), ServiceError> {
        lrp.validate()?;
        let key = desired_lrp_key(&lrp.process_guid);
        self.store.set(&key, encode(&lrp)?).await?;
        tracing::info!(process_guid = %lrp.process_guid, domain = %lrp.domain, "desired lrp created");
        Ok(())
    }

    pub async fn get(&self, process_guid: &str) -> Result<DesiredLrp, ServiceError> {
        require_guid(process_guid)?;
        let node = self.fetch(process_guid).await?;
        decode_desired(process_guid, node)
    }

    pub async fn update(
        &self,
        process_guid: &str,
        update: &DesiredLrpUpdate,
    ) -> Result<(), ServiceError> {
        require_guid(process_guid)?;
        update.validate()?;
        let node = self.fetch(process_guid).await?;
        let mut lrp = decode_desired(process_guid, node)?;
        lrp.apply_update(update);
        self.store
            .set(&desired_lrp_key(process_guid), encode(&lrp)?)
            .await?;
        tracing::info!(process_guid = %process_guid, instances = lrp.instances, "desired lrp updated");
        Ok(())
    }

    pub async fn remove(&self, process_guid: &str) -> Result<(), ServiceError> {
        require_guid(process_guid)?;
        match self.store.delete(&desired_lrp_key(process_guid)).await {
            Ok(()) => {
                tracing::info!(process_guid = %process_guid, "desired lrp removed");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => {
                Err(ServiceError::DesiredLrpNotFound(process_guid.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list(&self) -> Result<Vec<DesiredLrp>, ServiceError> {
        let nodes = self.store.get_all(DESIRED_LRP_ROOT).await?;
        let mut lrps = Vec::with_capacity(nodes.len());
        for node in nodes {
            let key = node.key.clone();
            lrps.push(
                serde_json::from_slice(&node.value)
                    .map_err(|source| ServiceError::Decode { key, source })?,
            );
        }
        Ok(lrps)
    }

    /// Exact-match filter on `domain`. The caller rejects an empty domain.
    pub async fn list_by_domain(&self, domain: &str) -> Result<Vec<DesiredLrp>, ServiceError> {
        let mut lrps = self.list().await?;
        lrps.retain(|lrp| lrp.domain == domain);
        Ok(lrps)
    }

    async fn fetch(&self, process_guid: &str) -> Result<StoreNode, ServiceError> {
        match self.store.get(&desired_lrp_key(process_guid)).await {
            Ok(node) => Ok(node),
            Err(StoreError::NotFound(_)) => {
                Err(ServiceError::DesiredLrpNotFound(process_guid.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

// `create` never writes a guid outside the key charset, so one here cannot
// name a stored record and must not reach the store as a path.
fn require_guid(process_guid: &str) -> Result<(), ServiceError> {
    if process_guid.is_empty() {
        return Err(ServiceError::MissingIdentifier("process_guid"));
    }
    if !is_valid_guid(process_guid) {
        return Err(ServiceError::DesiredLrpNotFound(process_guid.to_string()));
    }
    Ok(())
}

// An empty payload is treated as absent rather than as a decode failure.
fn decode_desired(process_guid: &str, node: StoreNode) -> Result<DesiredLrp, ServiceError> {
    if node.value.is_empty() {
        return Err(ServiceError::DesiredLrpNotFound(process_guid.to_string()));
    }
    serde_json::from_slice(&node.value).map_err(|source| ServiceError::Decode {
        key: node.key,
        source,
    })
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> Result<Bytes, ServiceError> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(ServiceError::Encode)
}
