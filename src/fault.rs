// src/fault.rs

//! Capturing panics raised by runnables.
//!
//! Workers must survive a panicking sub-task: a dead worker would leave the
//! completion counter of its batch short forever. Every sub-task therefore
//! runs under [`execute`], and the first panic of a batch is kept as a
//! [`TaskFault`] for whoever is waiting on that batch.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use crate::runnable::Runnable;
use crate::types::TaskId;

/// A panic raised while running one sub-task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFault {
    /// Batch the sub-task belonged to (`TaskId::PLACEHOLDER` for variants
    /// without batch identifiers).
    pub batch: TaskId,
    pub index: usize,
    pub message: String,
}

impl fmt::Display for TaskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch {} sub-task {}: {}",
            self.batch, self.index, self.message
        )
    }
}

/// Run one sub-task, converting a panic into a [`TaskFault`].
pub fn execute(
    runnable: &dyn Runnable,
    batch: TaskId,
    index: usize,
    total: usize,
) -> Result<(), TaskFault> {
    panic::catch_unwind(AssertUnwindSafe(|| runnable.run_task(index, total))).map_err(|payload| {
        let fault = TaskFault {
            batch,
            index,
            message: panic_message(payload.as_ref()),
        };
        warn!(batch = %fault.batch, index, message = %fault.message, "sub-task panicked");
        fault
    })
}

/// Keep the first fault seen; later ones are dropped.
pub fn record_first(slot: &mut Option<TaskFault>, fault: TaskFault) {
    if slot.is_none() {
        *slot = Some(fault);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
