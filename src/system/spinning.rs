// src/system/spinning.rs

//! Persistent pool whose workers busy-poll for work.
//!
//! The pool owns a single batch slot. `run` publishes a batch into the slot
//! and then sleeps on a condition variable; workers poll the slot, claim
//! indices, and the worker finishing the last sub-task wakes the submitter.
//! Both the completion predicate and the wait use the slot's mutex, so the
//! wakeup cannot be lost between the final increment and the wait.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace};

use crate::errors::{Result, TaskSysError};
use crate::fault::{self, TaskFault};
use crate::runnable::Runnable;
use crate::system::{TaskSystem, check_thread_count};
use crate::types::TaskId;

/// The batch currently being drained, if any.
#[derive(Default)]
struct BatchSlot {
    runnable: Option<Arc<dyn Runnable>>,
    total: usize,
    /// Sub-tasks not yet claimed. The next index is `total - remaining`.
    remaining: usize,
    finished: usize,
    fault: Option<TaskFault>,
}

impl BatchSlot {
    fn claim(&mut self) -> Option<(Arc<dyn Runnable>, usize, usize)> {
        if self.remaining == 0 {
            return None;
        }
        let runnable = self.runnable.as_ref()?;
        let index = self.total - self.remaining;
        self.remaining -= 1;
        Some((Arc::clone(runnable), index, self.total))
    }

    fn is_done(&self) -> bool {
        self.finished == self.total
    }
}

struct Shared {
    slot: Mutex<BatchSlot>,
    /// Signalled when the slot's batch finishes.
    done: Condvar,
    shutdown: AtomicBool,
}

impl Shared {
    fn worker_loop(&self, worker: usize) {
        debug!(worker, "spinning worker started");

        while !self.shutdown.load(Ordering::Acquire) {
            let claimed = self.slot.lock().claim();

            let Some((runnable, index, total)) = claimed else {
                std::hint::spin_loop();
                thread::yield_now();
                continue;
            };

            trace!(worker, index, total, "spinning: claimed sub-task");
            let outcome = fault::execute(runnable.as_ref(), TaskId::PLACEHOLDER, index, total);
            drop(runnable);

            let mut slot = self.slot.lock();
            if let Err(fault) = outcome {
                fault::record_first(&mut slot.fault, fault);
            }
            slot.finished += 1;
            if slot.is_done() {
                self.done.notify_all();
            }
        }

        debug!(worker, "spinning worker exiting");
    }
}

/// Thread pool created once; workers spin while waiting for work.
pub struct SpinningPoolSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    /// Serialises concurrent `run` callers onto the single batch slot.
    submit: Mutex<()>,
}

impl std::fmt::Debug for SpinningPoolSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinningPoolSystem")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl SpinningPoolSystem {
    pub fn new(num_threads: usize) -> Result<Self> {
        let num_threads = check_thread_count(num_threads)?;
        let shared = Arc::new(Shared {
            slot: Mutex::new(BatchSlot::default()),
            done: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(num_threads),
            submit: Mutex::new(()),
        };

        for worker in 0..num_threads {
            let shared = Arc::clone(&pool.shared);
            // On failure `pool` is dropped, which stops the workers spawned so far.
            let handle = thread::Builder::new()
                .name(format!("tasksys-spin-{worker}"))
                .spawn(move || shared.worker_loop(worker))
                .map_err(TaskSysError::Spawn)?;
            pool.workers.push(handle);
        }

        info!(num_threads, "spinning pool started");
        Ok(pool)
    }

    /// Stop all workers and join them.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_workers()
    }

    fn stop_workers(&mut self) -> Result<()> {
        if self.workers.is_empty() {
            return Ok(());
        }

        self.shared.shutdown.store(true, Ordering::Release);

        let mut result = Ok(());
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
            if handle.join().is_err() && result.is_ok() {
                result = Err(TaskSysError::WorkerJoin(name));
            }
        }

        info!("spinning pool stopped");
        result
    }
}

impl Drop for SpinningPoolSystem {
    fn drop(&mut self) {
        if let Err(e) = self.stop_workers() {
            error!(error = %e, "spinning pool shutdown failed");
        }
    }
}

impl TaskSystem for SpinningPoolSystem {
    fn name(&self) -> &'static str {
        "Parallel + Thread Pool + Spin"
    }

    fn run(&self, runnable: Arc<dyn Runnable>, total: usize) -> Result<()> {
        if total == 0 {
            return Ok(());
        }

        let _submit = self.submit.lock();

        let mut slot = self.shared.slot.lock();
        *slot = BatchSlot {
            runnable: Some(runnable),
            total,
            remaining: total,
            finished: 0,
            fault: None,
        };
        debug!(total, "spinning: published batch");

        while !slot.is_done() {
            self.shared.done.wait(&mut slot);
        }

        let finished = std::mem::take(&mut *slot);
        drop(slot);
        debug!(total, "spinning: batch finished");

        match finished.fault {
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
