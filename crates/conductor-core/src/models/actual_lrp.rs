//! Actual LRP: one running (or starting, or crashed) instance reported by a cell.
//!
//! Cells own these records. Conductor only reads and serializes them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualLrp {
    pub process_guid: String,
    pub index: u32,
    pub instance_guid: String,
    #[serde(default)]
    pub cell_id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    pub state: ActualLrpState,
    /// Unix nanos of the last state transition.
    #[serde(default)]
    pub since: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
}

/// Lifecycle of an instance: `Invalid → Starting → Running`, or `Crashed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActualLrpState {
    Invalid,
    Starting,
    Running,
    Crashed,
}

/// Returned when a wire token is not one of the known states.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown actual LRP state '{0}'")]
pub struct UnknownState(pub String);

impl ActualLrpState {
    pub const ALL: [ActualLrpState; 4] = [
        ActualLrpState::Invalid,
        ActualLrpState::Starting,
        ActualLrpState::Running,
        ActualLrpState::Crashed,
    ];

    /// The fixed uppercase token used in HTTP payloads.
    pub fn as_wire(self) -> &'static str {
        match self {
            ActualLrpState::Invalid => "INVALID",
            ActualLrpState::Starting => "STARTING",
            ActualLrpState::Running => "RUNNING",
            ActualLrpState::Crashed => "CRASHED",
        }
    }
}

impl fmt::Display for ActualLrpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for ActualLrpState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_wire() == s)
            .ok_or_else(|| UnknownState(s.to_string()))
    }
}
