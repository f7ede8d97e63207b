// src/config/mod.rs

//! Workload files for the `tasksys` binary.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a workload file from disk (`loader.rs`).
//! - Validate it, including acyclicity of the batch graph (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_workload_path, load_and_validate, load_from_path};
pub use model::{BatchConfig, ConfigSection, RawWorkloadFile, WorkKind, WorkloadFile};
