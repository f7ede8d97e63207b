// src/system/sleeping/graph.rs

//! Dependency-aware batch bookkeeping for the sleeping pool.
//!
//! [`BatchGraph`] is a plain data structure with no locking of its own; the
//! pool keeps it behind a single mutex. Batches live in an arena indexed by
//! their dense [`TaskId`], edges are stored as id lists, and a batch is moved
//! to the ready queue once its pending predecessor count reaches zero.
//!
//! Each batch keeps its own fault until somebody collects it: the caller of
//! a synchronous run takes the fault of its own batch, and `sync` takes the
//! faults of asynchronous batches issued before it started. Finished batches
//! are retired from the front of the arena once their fault (if any) has
//! been collected, so ids below `first_live` always refer to finished,
//! reported batches.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{Result, TaskSysError};
use crate::fault::{self, TaskFault};
use crate::runnable::Runnable;
use crate::types::TaskId;

/// Lifecycle of a batch. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Waiting on at least one unfinished predecessor.
    Pending,
    /// All predecessors done; queued, nothing claimed yet.
    Ready,
    /// At least one sub-task claimed.
    Draining,
    /// Every sub-task finished (or the batch was skipped).
    Done,
}

struct BatchRecord {
    /// Dropped as soon as the batch is done.
    runnable: Option<Arc<dyn Runnable>>,
    total: usize,
    /// Claim counter: next unclaimed index.
    next: usize,
    /// Completion counter.
    finished: usize,
    pending_deps: usize,
    dependents: Vec<TaskId>,
    state: BatchState,
    /// Panicked itself, or skipped because a predecessor failed.
    failed: bool,
    /// First panic of this batch's own sub-tasks, until collected.
    fault: Option<TaskFault>,
    /// Fault goes to the submitting caller rather than to `sync`.
    awaited: bool,
}

/// One claimed sub-task, executed outside the lock.
pub(crate) struct Claim {
    pub batch: TaskId,
    pub runnable: Arc<dyn Runnable>,
    pub index: usize,
    pub total: usize,
}

/// What changed as a result of a submission or a finished sub-task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct GraphStep {
    /// Batches that entered the ready queue.
    pub newly_ready: usize,
    /// Batches that reached `Done`, skipped ones included.
    pub completed: usize,
}

pub(crate) struct BatchGraph {
    first_live: TaskId,
    next_id: TaskId,
    batches: VecDeque<BatchRecord>,
    ready: VecDeque<TaskId>,
    outstanding: usize,
}

impl BatchGraph {
    pub fn new() -> Self {
        Self {
            first_live: TaskId::FIRST,
            next_id: TaskId::FIRST,
            batches: VecDeque::new(),
            ready: VecDeque::new(),
            outstanding: 0,
        }
    }

    /// Number of batches issued but not yet done.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// First id not issued yet.
    pub fn horizon(&self) -> TaskId {
        self.next_id
    }

    /// State of a live batch; `Done` for retired ones, `None` if never issued.
    pub fn state_of(&self, id: TaskId) -> Option<BatchState> {
        if id < TaskId::FIRST || id >= self.next_id {
            return None;
        }
        Some(self.get(id).map_or(BatchState::Done, |b| b.state))
    }

    /// Record a new asynchronous batch; its fault is collected by `sync`.
    ///
    /// Unknown dependencies reject the whole submission and leave the graph
    /// untouched.
    pub fn submit(
        &mut self,
        runnable: Arc<dyn Runnable>,
        total: usize,
        deps: &[TaskId],
    ) -> Result<(TaskId, GraphStep)> {
        self.insert(runnable, total, deps, false)
    }

    /// Record an independent batch whose submitter collects its fault with
    /// [`BatchGraph::take_fault`].
    pub fn submit_awaited(
        &mut self,
        runnable: Arc<dyn Runnable>,
        total: usize,
    ) -> Result<(TaskId, GraphStep)> {
        self.insert(runnable, total, &[], true)
    }

    fn insert(
        &mut self,
        runnable: Arc<dyn Runnable>,
        total: usize,
        deps: &[TaskId],
        awaited: bool,
    ) -> Result<(TaskId, GraphStep)> {
        let mut deps = deps.to_vec();
        deps.sort_unstable();
        deps.dedup();

        if let Some(&bad) = deps
            .iter()
            .find(|&&d| d < TaskId::FIRST || d >= self.next_id)
        {
            return Err(TaskSysError::UnknownTaskId {
                id: bad,
                next: self.next_id,
            });
        }

        let id = self.next_id;
        self.next_id = id.next();

        let mut pending_deps = 0;
        let mut failed = false;
        for &dep in &deps {
            let Some(pred) = self.get_mut(dep) else {
                continue; // retired, hence done
            };
            if pred.state == BatchState::Done {
                failed |= pred.failed;
            } else {
                pending_deps += 1;
                pred.dependents.push(id);
            }
        }

        self.batches.push_back(BatchRecord {
            runnable: Some(runnable),
            total,
            next: 0,
            finished: 0,
            pending_deps,
            dependents: Vec::new(),
            state: BatchState::Pending,
            failed: false,
            fault: None,
            awaited,
        });
        self.outstanding += 1;

        debug!(batch = %id, total, ?deps, pending_deps, awaited, "batch submitted");

        let mut step = GraphStep::default();
        if failed {
            warn!(batch = %id, "predecessor failed; skipping batch");
            self.mark_failed(id);
            self.complete(id, &mut step);
        } else if pending_deps == 0 {
            self.make_ready(id, &mut step);
        }

        Ok((id, step))
    }

    /// Claim one sub-task from the batch at the head of the ready queue.
    pub fn claim(&mut self) -> Option<Claim> {
        let &batch = self.ready.front()?;
        let record = self.get_mut(batch)?;
        let runnable = Arc::clone(record.runnable.as_ref()?);

        let index = record.next;
        let total = record.total;
        record.next += 1;
        record.state = BatchState::Draining;

        if record.next == total {
            self.ready.pop_front();
        }

        Some(Claim {
            batch,
            runnable,
            index,
            total,
        })
    }

    /// Account for one finished sub-task.
    pub fn finish(&mut self, batch: TaskId, outcome: std::result::Result<(), TaskFault>) -> GraphStep {
        let mut step = GraphStep::default();

        let done = match self.get_mut(batch) {
            Some(record) => {
                if let Err(fault) = outcome {
                    fault::record_first(&mut record.fault, fault);
                    record.failed = true;
                }
                record.finished += 1;
                record.finished == record.total
            }
            None => {
                warn!(batch = %batch, "finished sub-task for retired batch; ignoring");
                false
            }
        };

        if done {
            self.complete(batch, &mut step);
        }
        step
    }

    /// Every batch issued before `horizon` is done.
    pub fn settled_before(&self, horizon: TaskId) -> bool {
        let live = self.live_len_before(horizon);
        self.batches
            .iter()
            .take(live)
            .all(|record| record.state == BatchState::Done)
    }

    /// Collect the fault of one awaited batch.
    pub fn take_fault(&mut self, id: TaskId) -> Option<TaskFault> {
        let fault = self.get_mut(id).and_then(|record| record.fault.take());
        self.retire_reported();
        fault
    }

    /// Collect the faults of asynchronous batches issued before `horizon`
    /// and hand out the first one, in id order.
    ///
    /// Faults of awaited batches are left for their submitters.
    pub fn take_sync_fault(&mut self, horizon: TaskId) -> Option<TaskFault> {
        let live = self.live_len_before(horizon);
        let mut first = None;
        for record in self.batches.iter_mut().take(live) {
            if record.awaited {
                continue;
            }
            if let Some(fault) = record.fault.take() {
                fault::record_first(&mut first, fault);
            }
        }
        self.retire_reported();
        first
    }

    /// Drop finished, reported batches from the front of the arena.
    fn retire_reported(&mut self) {
        let from = self.first_live;
        while let Some(front) = self.batches.front() {
            if front.state != BatchState::Done || front.fault.is_some() {
                break;
            }
            self.batches.pop_front();
            self.first_live = self.first_live.next();
        }
        if from != self.first_live {
            debug!(from = %from, to = %self.first_live, "retired finished batches");
        }
    }

    fn live_len_before(&self, horizon: TaskId) -> usize {
        let span = horizon.get().saturating_sub(self.first_live.get());
        usize::try_from(span).map_or(self.batches.len(), |n| n.min(self.batches.len()))
    }

    fn get(&self, id: TaskId) -> Option<&BatchRecord> {
        let offset = id.get().checked_sub(self.first_live.get())?;
        self.batches.get(usize::try_from(offset).ok()?)
    }

    fn get_mut(&mut self, id: TaskId) -> Option<&mut BatchRecord> {
        let offset = id.get().checked_sub(self.first_live.get())?;
        self.batches.get_mut(usize::try_from(offset).ok()?)
    }

    fn mark_failed(&mut self, id: TaskId) {
        if let Some(record) = self.get_mut(id) {
            record.failed = true;
        }
    }

    /// Pending -> Ready. Empty batches have nothing to claim and complete at once.
    fn make_ready(&mut self, id: TaskId, step: &mut GraphStep) {
        let Some(record) = self.get_mut(id) else {
            return;
        };
        if record.total == 0 {
            self.complete(id, step);
            return;
        }
        record.state = BatchState::Ready;
        self.ready.push_back(id);
        step.newly_ready += 1;
        debug!(batch = %id, "batch ready");
    }

    /// Mark `root` done and release (or skip) everything waiting on it.
    fn complete(&mut self, root: TaskId, step: &mut GraphStep) {
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let Some(record) = self.get_mut(id) else {
                continue;
            };
            if record.state == BatchState::Done {
                continue;
            }

            record.state = BatchState::Done;
            record.runnable = None;
            let failed = record.failed;
            let dependents = std::mem::take(&mut record.dependents);
            self.outstanding -= 1;
            step.completed += 1;
            debug!(batch = %id, failed, "batch done");

            for dependent in dependents {
                let Some(next) = self.get_mut(dependent) else {
                    continue;
                };
                if next.state == BatchState::Done {
                    continue;
                }

                if failed {
                    warn!(batch = %dependent, predecessor = %id, "predecessor failed; skipping batch");
                    next.failed = true;
                    stack.push(dependent);
                    continue;
                }

                next.pending_deps -= 1;
                if next.pending_deps == 0 {
                    if next.total == 0 {
                        stack.push(dependent);
                    } else {
                        next.state = BatchState::Ready;
                        self.ready.push_back(dependent);
                        step.newly_ready += 1;
                        debug!(batch = %dependent, "batch ready");
                    }
                }
            }
        }
    }
}
