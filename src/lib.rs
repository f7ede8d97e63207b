// src/lib.rs

//! Thread-pool task systems.
//!
//! A [`Runnable`](runnable::Runnable) splits into `total` independent
//! sub-tasks; a [`TaskSystem`](system::TaskSystem) runs them on worker threads
//! and reports when they are done. Four implementations trade simplicity for
//! efficiency, see [`system`]. The sleeping pool additionally schedules
//! asynchronous batches with dependencies between them.

pub mod cli;
pub mod config;
pub mod errors;
pub mod fault;
pub mod logging;
pub mod runnable;
pub mod system;
pub mod types;
pub mod workload;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{WorkloadFile, default_workload_path, load_and_validate};
use crate::types::SystemKind;

pub use crate::errors::TaskSysError;
pub use crate::runnable::Runnable;
pub use crate::system::{TaskSystem, build};
pub use crate::types::TaskId;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the workload, applies command-line overrides, then
/// runs it `repeat` times on each selected task system.
pub fn run(args: CliArgs) -> Result<()> {
    let path = args.workload.clone().unwrap_or_else(default_workload_path);
    let mut workload =
        load_and_validate(&path).with_context(|| format!("loading workload {}", path.display()))?;

    if let Some(system) = args.system {
        workload.config.system = system;
    }
    if let Some(threads) = args.threads {
        workload.config.threads = threads;
    }
    if let Some(repeat) = args.repeat {
        workload.config.repeat = repeat;
    }

    if args.dry_run {
        print_dry_run(&workload);
        return Ok(());
    }

    let kinds: Vec<SystemKind> = if args.all_systems {
        SystemKind::ALL.to_vec()
    } else {
        vec![workload.config.system]
    };

    for kind in kinds {
        let system = build(kind, workload.config.threads)
            .with_context(|| format!("constructing {kind} task system"))?;
        info!(
            system = system.name(),
            threads = workload.config.threads,
            repeat = workload.config.repeat,
            "running workload"
        );

        for pass in 1..=workload.config.repeat {
            let report = workload::run_workload(system.as_ref(), &workload)
                .with_context(|| format!("running workload on {}", system.name()))?;
            debug!(pass, "workload pass complete");
            println!("{report}");
        }
    }

    Ok(())
}

/// Simple dry-run output: print config and batches in submission order.
fn print_dry_run(workload: &WorkloadFile) {
    println!("tasksys dry-run");
    println!("  config.system = {}", workload.config.system);
    println!("  config.threads = {}", workload.config.threads);
    println!("  config.repeat = {}", workload.config.repeat);
    println!();

    println!(
        "batches ({}, {} sub-tasks), in submission order:",
        workload.batch.len(),
        workload.total_sub_tasks()
    );
    for (name, batch) in workload.batches_in_order() {
        println!("  - {name}");
        println!("      kind: {:?}", batch.kind);
        println!("      tasks: {}", batch.tasks);
        if batch.work > 0 {
            println!("      work: {}", batch.work);
        }
        if !batch.after.is_empty() {
            println!("      after: {:?}", batch.after);
        }
    }

    debug!("dry-run complete (no execution)");
}
