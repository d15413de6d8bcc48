//! Store key layout.
//!
//! Every record lives under a fixed root; the identity fields of the
//! record form the remaining path segments.

pub const DESIRED_LRP_ROOT: &str = "/v1/desired";
pub const ACTUAL_LRP_ROOT: &str = "/v1/actual";
pub const TASK_ROOT: &str = "/v1/task";
pub const CELL_ROOT: &str = "/v1/cell";

pub fn desired_lrp_key(process_guid: &str) -> String {
    format!("{DESIRED_LRP_ROOT}/{process_guid}")
}

/// Directory holding every actual LRP of one process.
pub fn actual_lrp_process_dir(process_guid: &str) -> String {
    format!("{ACTUAL_LRP_ROOT}/{process_guid}")
}

pub fn actual_lrp_key(process_guid: &str, index: u32, instance_guid: &str) -> String {
    format!("{ACTUAL_LRP_ROOT}/{process_guid}/{index}/{instance_guid}")
}

pub fn task_key(task_guid: &str) -> String {
    format!("{TASK_ROOT}/{task_guid}")
}

pub fn cell_key(cell_id: &str) -> String {
    format!("{CELL_ROOT}/{cell_id}")
}
