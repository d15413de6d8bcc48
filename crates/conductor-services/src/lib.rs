pub mod actual_lrps;
pub mod cells;
pub mod desired_lrps;
pub mod error;
pub mod store;
pub mod task_watcher;

pub use actual_lrps::ActualLrpService;
pub use cells::CellService;
pub use desired_lrps::DesiredLrpService;
pub use error::ServiceError;
pub use task_watcher::{TaskWatcher, WatcherConfig};

use serde::de::DeserializeOwned;
use store::StoreNode;

/// Decode every node, logging and dropping the ones that fail.
pub(crate) fn decode_skipping_bad<T: DeserializeOwned>(nodes: Vec<StoreNode>, what: &str) -> Vec<T> {
    nodes
        .into_iter()
        .filter_map(|node| match serde_json::from_slice(&node.value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %node.key, error = %e, "skipping undecodable {what}");
                None
            }
        })
        .collect()
}
