//! Desired LRP: the declared target configuration of a long-running process.

use serde::{Deserialize, Serialize};

use super::{Action, EnvironmentVariable};
use crate::validation::{is_valid_guid, ValidationError};

/// Upper bound on `annotation`, in bytes.
pub const MAX_ANNOTATION_BYTES: usize = 10 * 1024;

/// Upper bound on `cpu_weight`.
pub const MAX_CPU_WEIGHT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredLrp {
    /// Globally unique identity; also the store key segment.
    pub process_guid: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub rootfs_path: String,
    #[serde(default)]
    pub stack: String,
    /// Target instance count. Signed so that negative requests reach the
    /// validator instead of failing to decode.
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
    /// Container ports exposed to the routing layer.
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Order is significant to the router.
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

/// A partial update. `None` leaves the stored field untouched; `Some`
/// overwrites it, including with an empty string or empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredLrpUpdate {
    pub instances: Option<i32>,
    pub annotation: Option<String>,
    pub routes: Option<Vec<String>>,
}

impl DesiredLrp {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();

        if self.process_guid.is_empty() {
            errors.push("process_guid", "must not be empty");
        } else if !is_valid_guid(&self.process_guid) {
            errors.push(
                "process_guid",
                "may only contain letters, digits, '-' and '_'",
            );
        }
        if self.instances < 0 {
            errors.push("instances", "must not be negative");
        }
        if self.cpu_weight > MAX_CPU_WEIGHT {
            errors.push("cpu_weight", format!("must be at most {MAX_CPU_WEIGHT}"));
        }
        check_annotation(&self.annotation, &mut errors);
        check_routes(&self.routes, &mut errors);
        if let Err(e) = self.action.validate("action") {
            errors.extend(e);
        }

        errors.into_result()
    }

    /// Overwrite the fields present in `update`.
    pub fn apply_update(&mut self, update: &DesiredLrpUpdate) {
        if let Some(instances) = update.instances {
            self.instances = instances;
        }
        if let Some(annotation) = &update.annotation {
            self.annotation.clone_from(annotation);
        }
        if let Some(routes) = &update.routes {
            self.routes.clone_from(routes);
        }
    }
}

impl DesiredLrpUpdate {
    pub fn is_empty(&self) -> bool {
        self.instances.is_none() && self.annotation.is_none() && self.routes.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        if matches!(self.instances, Some(n) if n < 0) {
            errors.push("instances", "must not be negative");
        }
        if let Some(annotation) = &self.annotation {
            check_annotation(annotation, &mut errors);
        }
        if let Some(routes) = &self.routes {
            check_routes(routes, &mut errors);
        }
        errors.into_result()
    }
}

fn check_annotation(annotation: &str, errors: &mut ValidationError) {
    if annotation.len() > MAX_ANNOTATION_BYTES {
        errors.push(
            "annotation",
            format!("must be at most {MAX_ANNOTATION_BYTES} bytes"),
        );
    }
}

fn check_routes(routes: &[String], errors: &mut ValidationError) {
    for (i, route) in routes.iter().enumerate() {
        if route.is_empty() {
            errors.push(format!("routes[{i}]"), "must not be empty");
        }
    }
}
