// src/system/serial.rs

//! Reference implementation: every sub-task runs on the calling thread.

use std::sync::Arc;

use tracing::debug;

use crate::errors::{Result, TaskSysError};
use crate::fault;
use crate::runnable::Runnable;
use crate::system::{TaskSystem, check_thread_count};
use crate::types::TaskId;

/// Runs sub-tasks one after another, in increasing index order.
#[derive(Debug)]
pub struct SerialSystem {
    _priv: (),
}

impl SerialSystem {
    /// The thread budget is validated but otherwise ignored.
    pub fn new(num_threads: usize) -> Result<Self> {
        check_thread_count(num_threads)?;
        Ok(Self { _priv: () })
    }
}

impl TaskSystem for SerialSystem {
    fn name(&self) -> &'static str {
        "Serial"
    }

    /// Stops at the first panicking sub-task; later indices are not run.
    fn run(&self, runnable: Arc<dyn Runnable>, total: usize) -> Result<()> {
        debug!(total, "serial: running batch on calling thread");
        for index in 0..total {
            fault::execute(runnable.as_ref(), TaskId::PLACEHOLDER, index, total)
                .map_err(TaskSysError::TaskPanicked)?;
        }
        Ok(())
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
