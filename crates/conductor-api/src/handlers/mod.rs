//! HTTP API handlers: desired-state CRUD and read-only views as JSON.

pub mod actual_lrps;
pub mod cells;
pub mod desired_lrps;

use std::sync::Arc;

use conductor_services::store::Store;
use conductor_services::{ActualLrpService, CellService, DesiredLrpService};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Clone)]
pub struct ApiState {
    pub desired: DesiredLrpService,
    pub actual: ActualLrpService,
    pub cells: CellService,
}

impl ApiState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            desired: DesiredLrpService::new(Arc::clone(&store)),
            actual: ActualLrpService::new(Arc::clone(&store)),
            cells: CellService::new(store),
        }
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// `?domain=` on list endpoints. Present-but-empty is a client error.
#[derive(Debug, Default, Deserialize)]
pub struct DomainQuery {
    pub domain: Option<String>,
}

impl DomainQuery {
    fn domain(&self) -> Result<Option<&str>, ApiError> {
        match self.domain.as_deref() {
            Some("") => Err(ApiError::invalid_request("domain missing from request")),
            other => Ok(other),
        }
    }
}

/// Log a failed operation and hand back the error for the response.
fn failed(op: &'static str, err: impl Into<ApiError>) -> ApiError {
    let err = err.into();
    if err.status.is_server_error() {
        tracing::error!(op, error = %err, "request failed");
    } else {
        tracing::debug!(op, status = %err.status, error = %err, "request rejected");
    }
    err
}
