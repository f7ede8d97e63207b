use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tasksys::Runnable;

/// Thread-safe per-index hit counter.
///
/// As a [`Runnable`], every `run_task(i, _)` bumps slot `i`.
pub struct HitCounter {
    hits: Vec<AtomicUsize>,
}

impl HitCounter {
    pub fn new(total: usize) -> Arc<Self> {
        Arc::new(Self {
            hits: (0..total).map(|_| AtomicUsize::new(0)).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Sum over all slots.
    pub fn total_hits(&self) -> usize {
        self.hits.iter().map(|h| h.load(Ordering::SeqCst)).sum()
    }

    /// Indices whose count is not exactly one.
    pub fn wrong_indices(&self) -> Vec<(usize, usize)> {
        self.hits
            .iter()
            .enumerate()
            .map(|(i, h)| (i, h.load(Ordering::SeqCst)))
            .filter(|&(_, n)| n != 1)
            .collect()
    }

    /// Panics with the offending indices unless every slot was hit once.
    pub fn assert_exactly_once(&self) {
        let wrong = self.wrong_indices();
        assert!(wrong.is_empty(), "indices not run exactly once (index, hits): {wrong:?}");
    }
}

impl Runnable for HitCounter {
    fn run_task(&self, index: usize, total: usize) {
        assert_eq!(total, self.hits.len(), "total passed to run_task changed");
        self.hits[index].fetch_add(1, Ordering::SeqCst);
    }
}

/// Global logical clock shared by several batches.
///
/// Each sub-task records a start and end stamp; comparing stamps of two
/// batches shows whether one ran entirely before the other started.
#[derive(Default)]
pub struct StampLog {
    clock: AtomicU64,
    stamps: Mutex<Vec<Stamp>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Stamp {
    pub batch: usize,
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl StampLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Runnable for batch `batch` that stamps into this log.
    pub fn batch(self: &Arc<Self>, batch: usize) -> Arc<dyn Runnable> {
        let log = Arc::clone(self);
        Arc::new(move |index: usize, _total: usize| {
            let start = log.clock.fetch_add(1, Ordering::SeqCst);
            std::hint::spin_loop();
            let end = log.clock.fetch_add(1, Ordering::SeqCst);
            log.stamps.lock().push(Stamp {
                batch,
                index,
                start,
                end,
            });
        })
    }

    pub fn stamps_of(&self, batch: usize) -> Vec<Stamp> {
        self.stamps
            .lock()
            .iter()
            .filter(|s| s.batch == batch)
            .copied()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stamps.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Asserts every sub-task of `before` ended before any of `after` started.
    pub fn assert_ordered(&self, before: usize, after: usize) {
        let first = self.stamps_of(before);
        let second = self.stamps_of(after);
        let Some(last_end) = first.iter().map(|s| s.end).max() else {
            return;
        };
        if let Some(first_start) = second.iter().map(|s| s.start).min() {
            assert!(
                last_end < first_start,
                "batch {after} started at {first_start} before batch {before} finished at {last_end}"
            );
        }
    }
}
