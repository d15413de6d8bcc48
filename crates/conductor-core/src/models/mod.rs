//! Domain model: the records conductor reads from and writes to the store.
//!
//! These structs are the persisted JSON form. The HTTP wire shapes live in
//! [`crate::wire`] and convert to and from these types.

pub mod action;
pub mod actual_lrp;
pub mod cell;
pub mod desired_lrp;
pub mod task;

use serde::{Deserialize, Serialize};

pub use action::{
    Action, DownloadAction, EmitProgressAction, ParallelAction, RunAction, SerialAction,
};
pub use actual_lrp::{ActualLrp, ActualLrpState, PortMapping};
pub use cell::CellPresence;
pub use desired_lrp::{DesiredLrp, DesiredLrpUpdate};
pub use task::{Task, TaskState};

/// An environment variable passed to a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

/// Unix time in nanoseconds.
pub fn now_nanos() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
