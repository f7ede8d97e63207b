// src/system/mod.rs

//! Task system implementations.
//!
//! All variants share the [`TaskSystem`] contract and differ only in how
//! sub-tasks reach worker threads:
//!
//! - [`serial`] runs everything on the calling thread.
//! - [`spawn`] spawns fresh threads for every `run` call.
//! - [`spinning`] keeps a persistent pool whose workers busy-poll for work.
//! - [`sleeping`] keeps a persistent pool whose idle workers sleep, and adds
//!   asynchronous batches with dependencies.

pub mod serial;
pub mod sleeping;
pub mod spawn;
pub mod spinning;

use std::sync::Arc;

use tracing::debug;

use crate::errors::{Result, TaskSysError};
use crate::runnable::Runnable;
use crate::types::{SystemKind, TaskId};

pub use serial::SerialSystem;
pub use sleeping::SleepingPoolSystem;
pub use spawn::SpawnSystem;
pub use spinning::SpinningPoolSystem;

/// Common contract of all task systems.
pub trait TaskSystem: Send + Sync {
    /// Static label of the implementation (diagnostics only).
    fn name(&self) -> &'static str;

    /// Run `total` sub-tasks of `runnable` and block until all of them are
    /// done.
    ///
    /// Returns [`TaskSysError::TaskPanicked`] if any sub-task panicked; the
    /// remaining sub-tasks still ran.
    fn run(&self, runnable: Arc<dyn Runnable>, total: usize) -> Result<()>;

    /// Submit a batch that must not start before every batch in `deps` is
    /// done. Returns the identifier of the new batch.
    fn run_async_with_deps(
        &self,
        runnable: Arc<dyn Runnable>,
        total: usize,
        deps: &[TaskId],
    ) -> Result<TaskId>;

    /// Block until every batch submitted with
    /// [`run_async_with_deps`](TaskSystem::run_async_with_deps) is done.
    fn sync(&self) -> Result<()>;
}

/// Construct the task system selected by `kind` with `num_threads` threads.
pub fn build(kind: SystemKind, num_threads: usize) -> Result<Box<dyn TaskSystem>> {
    debug!(%kind, num_threads, "constructing task system");

    let system: Box<dyn TaskSystem> = match kind {
        SystemKind::Serial => Box::new(SerialSystem::new(num_threads)?),
        SystemKind::Spawn => Box::new(SpawnSystem::new(num_threads)?),
        SystemKind::Spinning => Box::new(SpinningPoolSystem::new(num_threads)?),
        SystemKind::Sleeping => Box::new(SleepingPoolSystem::new(num_threads)?),
    };

    Ok(system)
}

/// Reject thread budgets below one.
pub(crate) fn check_thread_count(num_threads: usize) -> Result<usize> {
    if num_threads == 0 {
        return Err(TaskSysError::InvalidThreadCount(num_threads));
    }
    Ok(num_threads)
}
