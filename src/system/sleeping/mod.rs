// src/system/sleeping/mod.rs

//! Persistent pool whose idle workers sleep, with asynchronous batches.
//!
//! - [`graph`] tracks batches, their dependencies and the ready queue.
//! - This module owns the worker threads and the wake/sleep protocol.
//!
//! All shared state sits behind one mutex. Workers wait on `work` while the
//! ready queue is empty, and `run`/`sync` callers wait on `idle` until the
//! batches they cover are done. Every predicate is checked under that same mutex, and every
//! state change that can make a predicate true notifies the matching
//! condition variable before the mutex is released.

pub mod graph;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, trace, warn};

use crate::errors::{Result, TaskSysError};
use crate::fault;
use crate::runnable::Runnable;
use crate::system::{TaskSystem, check_thread_count};
use crate::types::TaskId;

pub use graph::BatchState;
use graph::{BatchGraph, Claim, GraphStep};

struct PoolState {
    graph: BatchGraph,
    shutdown: bool,
}

struct Shared {
    state: Mutex<PoolState>,
    /// Signalled when batches become ready, and on shutdown.
    work: Condvar,
    /// Signalled whenever a batch is done.
    idle: Condvar,
}

impl Shared {
    fn notify(&self, step: GraphStep) {
        if step.newly_ready > 0 {
            self.work.notify_all();
        }
        if step.completed > 0 {
            self.idle.notify_all();
        }
    }

    fn worker_loop(&self, worker: usize) {
        debug!(worker, "sleeping worker started");
        let mut state = self.state.lock();

        loop {
            if let Some(Claim {
                batch,
                runnable,
                index,
                total,
            }) = state.graph.claim()
            {
                trace!(worker, batch = %batch, index, "claimed sub-task");

                // The clone is released before relocking so that a finished
                // batch holds no reference to its runnable.
                let outcome = MutexGuard::unlocked(&mut state, move || {
                    fault::execute(runnable.as_ref(), batch, index, total)
                });

                let step = state.graph.finish(batch, outcome);
                self.notify(step);
                continue;
            }

            if state.shutdown {
                break;
            }

            self.work.wait(&mut state);
        }

        debug!(worker, "sleeping worker exiting");
    }

    /// Block until `id` and every batch issued before it are done, then
    /// report the fault of `id` alone.
    fn wait_for(&self, id: TaskId) -> Result<()> {
        let mut state = self.state.lock();
        while !state.graph.settled_before(id.next()) {
            self.idle.wait(&mut state);
        }

        match state.graph.take_fault(id) {
            Some(fault) => Err(TaskSysError::TaskPanicked(fault)),
            None => Ok(()),
        }
    }

    /// Block until every batch issued so far is done, then report the first
    /// fault among the asynchronous ones.
    fn wait_settled(&self) -> Result<()> {
        let mut state = self.state.lock();
        let horizon = state.graph.horizon();
        trace!(horizon = %horizon, outstanding = state.graph.outstanding(), "waiting for batches");
        while !state.graph.settled_before(horizon) {
            self.idle.wait(&mut state);
        }

        match state.graph.take_sync_fault(horizon) {
            Some(fault) => Err(TaskSysError::TaskPanicked(fault)),
            None => Ok(()),
        }
    }
}

/// Thread pool created once; workers sleep when there is nothing to run.
///
/// Besides the synchronous [`TaskSystem::run`], this pool schedules
/// asynchronous batches: [`TaskSystem::run_async_with_deps`] returns at once,
/// and a batch is admitted to the ready queue only after all batches it
/// depends on are done. If a sub-task panics, the batch still completes and
/// every batch depending on it is skipped. The fault of a [`TaskSystem::run`]
/// batch is returned by that call only; the fault of an asynchronous batch is
/// returned by the next [`TaskSystem::sync`] that started after it was issued.
pub struct SleepingPoolSystem {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for SleepingPoolSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SleepingPoolSystem")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl SleepingPoolSystem {
    pub fn new(num_threads: usize) -> Result<Self> {
        let num_threads = check_thread_count(num_threads)?;
        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                graph: BatchGraph::new(),
                shutdown: false,
            }),
            work: Condvar::new(),
            idle: Condvar::new(),
        });

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(num_threads),
        };

        for worker in 0..num_threads {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("tasksys-sleep-{worker}"))
                .spawn(move || shared.worker_loop(worker))
                .map_err(TaskSysError::Spawn)?;
            pool.workers.push(handle);
        }

        info!(num_threads, "sleeping pool started");
        Ok(pool)
    }

    /// Current state of a batch; `None` if `id` was never issued.
    pub fn state_of(&self, id: TaskId) -> Option<BatchState> {
        self.shared.state.lock().graph.state_of(id)
    }

    /// Finish outstanding batches, then stop and join all workers.
    ///
    /// A fault from batches nobody synced on is returned as well.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_workers()
    }

    fn stop_workers(&mut self) -> Result<()> {
        if self.workers.is_empty() {
            return Ok(());
        }

        let drained = self.shared.wait_settled();
        if let Err(ref e) = drained {
            warn!(error = %e, "unsynced batch failed before shutdown");
        }

        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.work.notify_all();
        }

        let mut joined = Ok(());
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
            if handle.join().is_err() && joined.is_ok() {
                joined = Err(TaskSysError::WorkerJoin(name));
            }
        }

        info!("sleeping pool stopped");
        joined.and(drained)
    }
}

impl Drop for SleepingPoolSystem {
    fn drop(&mut self) {
        if let Err(e) = self.stop_workers() {
            error!(error = %e, "sleeping pool shutdown failed");
        }
    }
}

impl TaskSystem for SleepingPoolSystem {
    fn name(&self) -> &'static str {
        "Parallel + Thread Pool + Sleep"
    }

    /// Also waits for asynchronous batches issued earlier, but leaves their
    /// faults to `sync`.
    fn run(&self, runnable: Arc<dyn Runnable>, total: usize) -> Result<()> {
        let id = {
            let mut state = self.shared.state.lock();
            let (id, step) = state.graph.submit_awaited(runnable, total)?;
            self.shared.notify(step);
            id
        };
        self.shared.wait_for(id)
    }

    fn run_async_with_deps(
        &self,
        runnable: Arc<dyn Runnable>,
        total: usize,
        deps: &[TaskId],
    ) -> Result<TaskId> {
        let mut state = self.shared.state.lock();
        let (id, step) = state.graph.submit(runnable, total, deps)?;
        self.shared.notify(step);
        Ok(id)
    }

    fn sync(&self) -> Result<()> {
        self.shared.wait_settled()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn dependent_batch_stays_pending_while_predecessor_blocks() {
        let system = SleepingPoolSystem::new(2).unwrap();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let release_rx = Mutex::new(release_rx);

        let a = system
            .run_async_with_deps(
                Arc::new(move |_: usize, _: usize| {
                    let _ = release_rx.lock().recv_timeout(Duration::from_secs(5));
                }),
                1,
                &[],
            )
            .unwrap();
        let b = system
            .run_async_with_deps(Arc::new(|_: usize, _: usize| {}), 4, &[a])
            .unwrap();

        assert_eq!(system.state_of(b), Some(BatchState::Pending));

        release_tx.send(()).unwrap();
        system.sync().unwrap();

        assert_eq!(system.state_of(a), Some(BatchState::Done));
        assert_eq!(system.state_of(b), Some(BatchState::Done));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let system = SleepingPoolSystem::new(1).unwrap();
        let err = system
            .run_async_with_deps(Arc::new(|_: usize, _: usize| {}), 1, &[TaskId(42)])
            .unwrap_err();

        assert!(matches!(err, TaskSysError::UnknownTaskId { id: TaskId(42), .. }));
        system.sync().unwrap();
    }

    #[test]
    fn sync_reports_fault_once_and_skips_dependents() {
        let system = SleepingPoolSystem::new(3).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let a = system
            .run_async_with_deps(
                Arc::new(|i: usize, _: usize| {
                    if i == 0 {
                        panic!("first sub-task fails");
                    }
                }),
                4,
                &[],
            )
            .unwrap();
        system
            .run_async_with_deps(
                Arc::new(move |_: usize, _: usize| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                8,
                &[a],
            )
            .unwrap();

        match system.sync() {
            Err(TaskSysError::TaskPanicked(fault)) => {
                assert_eq!(fault.batch, a);
                assert_eq!(fault.message, "first sub-task fails");
            }
            other => panic!("expected TaskPanicked, got {other:?}"),
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // The pool keeps working and the fault is not reported again.
        system.run(Arc::new(|_: usize, _: usize| {}), 16).unwrap();
        system.sync().unwrap();
    }

    #[test]
    fn drop_drains_unsynced_batches() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let system = SleepingPoolSystem::new(2).unwrap();
            let counter = Arc::clone(&hits);
            let a = system
                .run_async_with_deps(
                    Arc::new(move |_: usize, _: usize| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                    50,
                    &[],
                )
                .unwrap();
            let counter = Arc::clone(&hits);
            system
                .run_async_with_deps(
                    Arc::new(move |_: usize, _: usize| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                    50,
                    &[a],
                )
                .unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn shutdown_returns_unsynced_fault() {
        let system = SleepingPoolSystem::new(1).unwrap();
        system
            .run_async_with_deps(
                Arc::new(|i: usize, _: usize| {
                    if i == 0 {
                        panic!("late");
                    }
                }),
                1,
                &[],
            )
            .unwrap();

        assert!(matches!(system.shutdown(), Err(TaskSysError::TaskPanicked(_))));
    }

    #[test]
    fn run_fault_stays_with_its_own_caller() {
        let system = SleepingPoolSystem::new(2).unwrap();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);

        thread::scope(|scope| {
            let failing = scope.spawn(|| {
                system.run(
                    Arc::new(move |i: usize, _: usize| {
                        let _ = started_tx.lock().send(());
                        thread::sleep(Duration::from_millis(20));
                        if i == 0 {
                            panic!("caller A");
                        }
                    }),
                    1,
                )
            });

            started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            let quiet = scope.spawn(|| system.run(Arc::new(|_: usize, _: usize| {}), 0));

            assert!(quiet.join().unwrap().is_ok());
            match failing.join().unwrap() {
                Err(TaskSysError::TaskPanicked(fault)) => assert_eq!(fault.message, "caller A"),
                other => panic!("expected TaskPanicked, got {other:?}"),
            }
        });

        system.sync().unwrap();
    }

    #[test]
    fn run_does_not_take_unsynced_async_fault() {
        let system = SleepingPoolSystem::new(2).unwrap();
        let background = system
            .run_async_with_deps(
                Arc::new(|i: usize, _: usize| {
                    if i == 0 {
                        panic!("background");
                    }
                }),
                1,
                &[],
            )
            .unwrap();

        system.run(Arc::new(|_: usize, _: usize| {}), 8).unwrap();

        match system.sync() {
            Err(TaskSysError::TaskPanicked(fault)) => assert_eq!(fault.batch, background),
            other => panic!("expected TaskPanicked, got {other:?}"),
        }
    }
}
