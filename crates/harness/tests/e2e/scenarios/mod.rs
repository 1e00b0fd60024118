//! E2E test scenarios.
//!
//! S1-S3 are the reference scenarios (vpc with a failing destroy, apply
//! failure, missing rds output); the rest cover the resource-safety edges.

mod init_failure;
mod isolation;
mod missing_output;
mod system_tool;
mod vpc_destroy_failure;
