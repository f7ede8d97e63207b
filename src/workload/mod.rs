// src/workload/mod.rs

//! Synthetic workloads for exercising a task system.
//!
//! - [`kinds`] turns a `[batch.<name>]` section into a [`Runnable`].
//! - [`driver`] submits a whole workload file and waits for it.
//!
//! [`Runnable`]: crate::runnable::Runnable

pub mod driver;
pub mod kinds;

pub use driver::{WorkloadReport, run_workload};
pub use kinds::runnable_for;
