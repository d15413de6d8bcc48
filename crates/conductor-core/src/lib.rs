//! conductor-core: domain model, validation, wire format, and configuration.
//! All other conductor crates depend on this one.

pub mod config;
pub mod keys;
pub mod models;
pub mod validation;
pub mod wire;

pub use models::{
    Action, ActualLrp, ActualLrpState, CellPresence, DesiredLrp, DesiredLrpUpdate, Task,
    TaskState,
};
pub use validation::{is_valid_guid, FieldError, ValidationError};
