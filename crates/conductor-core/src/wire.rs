//! HTTP wire format: request and response payloads and their mapping to
//! the domain model.
//!
//! Everything here is pure conversion. Nothing in this module talks to the
//! store or writes an HTTP response; handlers do that.

use serde::{Deserialize, Serialize};

use crate::models::{
    Action, ActualLrp, ActualLrpState, CellPresence, DesiredLrp, DesiredLrpUpdate,
    EnvironmentVariable, PortMapping, Task,
};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Error token carried in the `type` field of every non-2xx body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorType {
    #[serde(rename = "InvalidJSON")]
    InvalidJson,
    InvalidRequest,
    #[serde(rename = "InvalidLRP")]
    InvalidLrp,
    #[serde(rename = "DesiredLRPNotFound")]
    DesiredLrpNotFound,
    Unauthorized,
    UnknownError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub message: String,
}

// ── Desired LRPs ──────────────────────────────────────────────────────────────

/// Body of `POST /v1/desired_lrps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredLrpCreateRequest {
    #[serde(default)]
    pub process_guid: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub rootfs_path: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub instances: i32,
    pub action: Action,
    #[serde(default)]
    pub env: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub memory_mb: u32,
    #[serde(default)]
    pub disk_mb: u32,
    #[serde(default)]
    pub cpu_weight: u32,
    #[serde(default)]
    pub ports: Vec<u16>,
    #[serde(default)]
    pub routes: Vec<String>,
    #[serde(default)]
    pub annotation: String,
    #[serde(default)]
    pub log_guid: String,
    #[serde(default)]
    pub log_source: String,
    #[serde(default)]
    pub completion_callback_url: String,
}

/// Body of `PUT /v1/desired_lrps/{process_guid}`.
///
/// A missing key (or JSON `null`) means "leave unchanged"; any present value,
/// including `""` or `[]`, replaces the stored one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredLrpUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredLrpResponse {
    pub process_guid: String,
    pub domain: String,
    pub rootfs_path: String,
    pub stack: String,
    pub instances: i32,
    pub action: Action,
    pub env: Vec<EnvironmentVariable>,
    pub memory_mb: u32,
    pub disk_mb: u32,
    pub cpu_weight: u32,
    pub ports: Vec<u16>,
    pub routes: Vec<String>,
    pub annotation: String,
    pub log_guid: String,
    pub log_source: String,
    pub completion_callback_url: String,
}

impl From<DesiredLrpCreateRequest> for DesiredLrp {
    fn from(req: DesiredLrpCreateRequest) -> Self {
        DesiredLrp {
            process_guid: req.process_guid,
            domain: req.domain,
            rootfs_path: req.rootfs_path,
            stack: req.stack,
            instances: req.instances,
            action: req.action,
            env: req.env,
            memory_mb: req.memory_mb,
            disk_mb: req.disk_mb,
            cpu_weight: req.cpu_weight,
            ports: req.ports,
            routes: req.routes,
            annotation: req.annotation,
            log_guid: req.log_guid,
            log_source: req.log_source,
            completion_callback_url: req.completion_callback_url,
        }
    }
}

impl From<DesiredLrpUpdateRequest> for DesiredLrpUpdate {
    fn from(req: DesiredLrpUpdateRequest) -> Self {
        DesiredLrpUpdate {
            instances: req.instances,
            annotation: req.annotation,
            routes: req.routes,
        }
    }
}

impl From<DesiredLrp> for DesiredLrpResponse {
    fn from(lrp: DesiredLrp) -> Self {
        DesiredLrpResponse {
            process_guid: lrp.process_guid,
            domain: lrp.domain,
            rootfs_path: lrp.rootfs_path,
            stack: lrp.stack,
            instances: lrp.instances,
            action: lrp.action,
            env: lrp.env,
            memory_mb: lrp.memory_mb,
            disk_mb: lrp.disk_mb,
            cpu_weight: lrp.cpu_weight,
            ports: lrp.ports,
            routes: lrp.routes,
            annotation: lrp.annotation,
            log_guid: lrp.log_guid,
            log_source: lrp.log_source,
            completion_callback_url: lrp.completion_callback_url,
        }
    }
}

// ── Actual LRPs ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrpResponse {
    pub process_guid: String,
    pub instance_guid: String,
    pub cell_id: String,
    pub domain: String,
    pub index: u32,
    pub host: String,
    pub ports: Vec<PortMapping>,
    /// One of `INVALID`, `STARTING`, `RUNNING`, `CRASHED`.
    pub state: String,
    pub since: i64,
}

impl From<ActualLrp> for ActualLrpResponse {
    fn from(lrp: ActualLrp) -> Self {
        ActualLrpResponse {
            process_guid: lrp.process_guid,
            instance_guid: lrp.instance_guid,
            cell_id: lrp.cell_id,
            domain: lrp.domain,
            index: lrp.index,
            host: lrp.host,
            ports: lrp.ports,
            state: lrp.state.as_wire().to_string(),
            since: lrp.since,
        }
    }
}

impl ActualLrpResponse {
    /// Parse the `state` token back into the domain enum.
    pub fn parsed_state(&self) -> Result<ActualLrpState, crate::models::actual_lrp::UnknownState> {
        self.state.parse()
    }
}

// ── Tasks ─────────────────────────────────────────────────────────────────────

/// Body POSTed to a task's completion callback URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub task_guid: String,
    pub domain: String,
    pub rootfs_path: String,
    pub stack: String,
    pub action: Action,
    pub completion_callback_url: String,
    pub annotation: String,
    pub state: String,
    pub cell_id: String,
    pub result: String,
    pub failed: bool,
    pub failure_reason: String,
    pub created_at: i64,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        TaskResponse {
            task_guid: task.task_guid,
            domain: task.domain,
            rootfs_path: task.rootfs_path,
            stack: task.stack,
            action: task.action,
            completion_callback_url: task.completion_callback_url,
            annotation: task.annotation,
            state: task.state.as_wire().to_string(),
            cell_id: task.cell_id,
            result: task.result,
            failed: task.failed,
            failure_reason: task.failure_reason,
            created_at: task.created_at,
        }
    }
}

// ── Cells ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellResponse {
    pub cell_id: String,
    pub stack: String,
}

impl From<CellPresence> for CellResponse {
    fn from(cell: CellPresence) -> Self {
        CellResponse {
            cell_id: cell.cell_id,
            stack: cell.stack,
        }
    }
}
