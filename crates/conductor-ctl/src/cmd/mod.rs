//! CLI command modules.

pub mod actual_lrps;
pub mod cells;
pub mod desired_lrps;
pub mod http;
