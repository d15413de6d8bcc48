//! Task: a one-shot unit of work whose completion is reported to a callback.

use serde::{Deserialize, Serialize};

use super::Action;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_guid: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub rootfs_path: String,
    #[serde(default)]
    pub stack: String,
    pub action: Action,
    #[serde(default)]
    pub completion_callback_url: String,
    #[serde(default)]
    pub annotation: String,
    pub state: TaskState,
    #[serde(default)]
    pub cell_id: String,
    /// Populated once the task reaches `Completed`.
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub failure_reason: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub updated_at: i64,
}

/// `Pending → Running → Completed`, then `Resolving` while a completion
/// callback is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Resolving,
}

impl TaskState {
    pub fn as_wire(self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Completed => "COMPLETED",
            TaskState::Resolving => "RESOLVING",
        }
    }
}

impl Task {
    pub fn has_callback(&self) -> bool {
        !self.completion_callback_url.is_empty()
    }

    /// A completed task that somebody asked to be told about.
    pub fn awaits_callback(&self) -> bool {
        self.state == TaskState::Completed && self.has_callback()
    }

    /// A delivery was claimed at `updated_at` and has not finished within
    /// `timeout_nanos`; the claimant is presumed to have failed.
    pub fn resolving_is_stale(&self, now_nanos: i64, timeout_nanos: i64) -> bool {
        self.state == TaskState::Resolving
            && self.has_callback()
            && now_nanos.saturating_sub(self.updated_at) >= timeout_nanos
    }
}
