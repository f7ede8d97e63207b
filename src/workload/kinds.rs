// src/workload/kinds.rs

use std::hint::black_box;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::{BatchConfig, WorkKind};
use crate::runnable::Runnable;

/// Build the runnable for one batch. Every executed sub-task bumps `executed`.
pub fn runnable_for(batch: &BatchConfig, executed: Arc<AtomicUsize>) -> Arc<dyn Runnable> {
    match batch.kind {
        WorkKind::Noop => Arc::new(Counted::new(Noop, executed)),
        WorkKind::Arithmetic => Arc::new(Counted::new(
            Arithmetic {
                iterations: batch.work,
            },
            executed,
        )),
        WorkKind::Fibonacci => Arc::new(Counted::new(Fibonacci { n: batch.work }, executed)),
        WorkKind::Sleep => Arc::new(Counted::new(
            Sleep {
                duration: Duration::from_micros(batch.work),
            },
            executed,
        )),
    }
}

struct Counted<R> {
    inner: R,
    executed: Arc<AtomicUsize>,
}

impl<R> Counted<R> {
    fn new(inner: R, executed: Arc<AtomicUsize>) -> Self {
        Self { inner, executed }
    }
}

impl<R: Runnable> Runnable for Counted<R> {
    fn run_task(&self, index: usize, total: usize) {
        self.inner.run_task(index, total);
        self.executed.fetch_add(1, Ordering::Relaxed);
    }
}

struct Noop;

impl Runnable for Noop {
    fn run_task(&self, _index: usize, _total: usize) {}
}

struct Arithmetic {
    iterations: u64,
}

impl Runnable for Arithmetic {
    fn run_task(&self, index: usize, _total: usize) {
        let mut x = index as f64 + 1.0;
        for i in 0..self.iterations {
            x = (x * 1.000_001 + i as f64).sqrt();
        }
        black_box(x);
    }
}

struct Fibonacci {
    n: u64,
}

fn fib(n: u64) -> u64 {
    if n < 2 { n } else { fib(n - 1) + fib(n - 2) }
}

impl Runnable for Fibonacci {
    fn run_task(&self, _index: usize, _total: usize) {
        black_box(fib(black_box(self.n)));
    }
}

struct Sleep {
    duration: Duration,
}

impl Runnable for Sleep {
    fn run_task(&self, _index: usize, _total: usize) {
        std::thread::sleep(self.duration);
    }
}
