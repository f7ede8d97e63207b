// src/system/spawn.rs

//! Spawn-per-call task system.
//!
//! Every `run` call spawns up to `num_threads` scoped threads which compete
//! for sub-task indices through a shared, mutex-protected counter. Joining
//! the scope is the only completion signal needed.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::errors::{Result, TaskSysError};
use crate::fault::{self, TaskFault};
use crate::runnable::Runnable;
use crate::system::{TaskSystem, check_thread_count};
use crate::types::TaskId;

#[derive(Debug)]
pub struct SpawnSystem {
    num_threads: usize,
}

impl SpawnSystem {
    pub fn new(num_threads: usize) -> Result<Self> {
        Ok(Self {
            num_threads: check_thread_count(num_threads)?,
        })
    }
}

/// State shared by the threads of one `run` call.
struct SpawnBatch<'a> {
    runnable: &'a dyn Runnable,
    total: usize,
    next: Mutex<usize>,
    fault: Mutex<Option<TaskFault>>,
}

impl SpawnBatch<'_> {
    /// Claim the next unclaimed index, if any is left.
    fn claim(&self) -> Option<usize> {
        let mut next = self.next.lock();
        if *next >= self.total {
            return None;
        }
        let index = *next;
        *next += 1;
        Some(index)
    }

    fn drain(&self) {
        while let Some(index) = self.claim() {
            trace!(index, total = self.total, "spawn: claimed sub-task");
            if let Err(fault) = fault::execute(self.runnable, TaskId::PLACEHOLDER, index, self.total)
            {
                fault::record_first(&mut self.fault.lock(), fault);
            }
        }
    }
}

impl TaskSystem for SpawnSystem {
    fn name(&self) -> &'static str {
        "Parallel + Always Spawn"
    }

    fn run(&self, runnable: Arc<dyn Runnable>, total: usize) -> Result<()> {
        if total == 0 {
            return Ok(());
        }

        let batch = SpawnBatch {
            runnable: runnable.as_ref(),
            total,
            next: Mutex::new(0),
            fault: Mutex::new(None),
        };
        let workers = self.num_threads.min(total);
        debug!(total, workers, "spawn: starting batch");

        // Threads that did start are joined by the scope even if a later
        // spawn fails; the batch is then finished by the ones that exist.
        let spawned: std::io::Result<()> = thread::scope(|scope| {
            for worker in 0..workers {
                thread::Builder::new()
                    .name(format!("tasksys-spawn-{worker}"))
                    .spawn_scoped(scope, || batch.drain())?;
            }
            Ok(())
        });

        if let Err(e) = spawned {
            // Nothing may have been spawned at all; finish on this thread.
            batch.drain();
            return Err(TaskSysError::Spawn(e));
        }

        match batch.fault.into_inner() {
            Some(fault) => Err(TaskSysError::TaskPanicked(fault)),
            None => Ok(()),
        }
    }

    fn run_async_with_deps(
        &self,
        runnable: Arc<dyn Runnable>,
        total: usize,
        _deps: &[TaskId],
    ) -> Result<TaskId> {
        self.run(runnable, total)?;
        Ok(TaskId::PLACEHOLDER)
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn each_index_runs_exactly_once_with_more_threads_than_tasks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let system = SpawnSystem::new(16).unwrap();

        system
            .run(Arc::new(move |i: usize, _: usize| log.lock().push(i)), 3)
            .unwrap();

        let mut seen = seen.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn uses_named_worker_threads_off_the_caller() {
        let names = Arc::new(Mutex::new(HashSet::new()));
        let log = Arc::clone(&names);
        let system = SpawnSystem::new(2).unwrap();

        system
            .run(
                Arc::new(move |_: usize, _: usize| {
                    let name = thread::current().name().map(str::to_string);
                    log.lock().insert(name);
                }),
                64,
            )
            .unwrap();

        for name in names.lock().iter() {
            let name = name.as_deref().unwrap_or("");
            assert!(name.starts_with("tasksys-spawn-"), "unexpected thread {name}");
        }
    }

    #[test]
    fn panic_is_reported_after_siblings_finish() {
        let count = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&count);
        let system = SpawnSystem::new(4).unwrap();

        let err = system
            .run(
                Arc::new(move |i: usize, _: usize| {
                    *counter.lock() += 1;
                    if i == 7 {
                        panic!("seven");
                    }
                }),
                32,
            )
            .unwrap_err();

        assert!(matches!(err, TaskSysError::TaskPanicked(ref f) if f.index == 7));
        assert_eq!(*count.lock(), 32);
    }
}
