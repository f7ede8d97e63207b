// src/runnable.rs

//! The unit of work handed to a task system.

/// Work that can be split into `total` independent sub-tasks.
///
/// A task system calls [`Runnable::run_task`] exactly once for every index in
/// `0..total`, possibly from several threads at the same time and in no
/// particular order. Implementations therefore only get `&self`.
pub trait Runnable: Send + Sync {
    fn run_task(&self, index: usize, total: usize);
}

impl<F> Runnable for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn run_task(&self, index: usize, total: usize) {
        self(index, total)
    }
}
