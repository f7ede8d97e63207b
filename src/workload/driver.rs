// src/workload/driver.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::WorkloadFile;
use crate::errors::Result;
use crate::system::TaskSystem;
use crate::types::TaskId;
use crate::workload::kinds::runnable_for;

/// Outcome of one pass over a workload.
#[derive(Debug, Clone)]
pub struct WorkloadReport {
    pub system: &'static str,
    pub batches: usize,
    pub sub_tasks: usize,
    pub elapsed: Duration,
}

impl fmt::Display for WorkloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} batches, {} sub-tasks in {:.3} ms",
            self.system,
            self.batches,
            self.sub_tasks,
            self.elapsed.as_secs_f64() * 1000.0
        )
    }
}

/// Submit every batch of `workload` in dependency order, then `sync`.
///
/// `after` names are translated into the ids returned for earlier
/// submissions. Task systems without asynchronous scheduling run each batch
/// while it is submitted, which trivially respects the order.
pub fn run_workload(system: &dyn TaskSystem, workload: &WorkloadFile) -> Result<WorkloadReport> {
    let executed = Arc::new(AtomicUsize::new(0));
    let mut ids: HashMap<&str, TaskId> = HashMap::with_capacity(workload.batch.len());

    let start = Instant::now();

    for (name, batch) in workload.batches_in_order() {
        let deps: Vec<TaskId> = batch
            .after
            .iter()
            .filter_map(|dep| ids.get(dep.as_str()).copied())
            .collect();

        let runnable = runnable_for(batch, Arc::clone(&executed));
        let id = system.run_async_with_deps(runnable, batch.tasks, &deps)?;
        debug!(batch = name, id = %id, tasks = batch.tasks, ?deps, "workload batch submitted");
        ids.insert(name, id);
    }

    system.sync()?;
    let elapsed = start.elapsed();

    let report = WorkloadReport {
        system: system.name(),
        batches: workload.batch.len(),
        sub_tasks: executed.load(Ordering::Relaxed),
        elapsed,
    };
    info!(
        system = report.system,
        batches = report.batches,
        sub_tasks = report.sub_tasks,
        elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
        "workload finished"
    );

    Ok(report)
}
