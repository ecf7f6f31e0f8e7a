//! Workflow orchestration.
//!
//! This module owns the process/reset state machine and post-run citation
//! resolution. CLI layers call into this module to keep responsibilities
//! separated.

mod controller;
pub mod resolve;

pub use controller::{ProcessRejection, Workbench, WorkbenchState};
