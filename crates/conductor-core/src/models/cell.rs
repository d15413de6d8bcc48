//! Cell presence: an execution node advertising itself in the store.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPresence {
    pub cell_id: String,
    #[serde(default)]
    pub stack: String,
    #[serde(default)]
    pub rep_address: String,
}
