// tests/dependency_properties.rs

use std::collections::BTreeSet;

use proptest::prelude::*;
use tasksys::system::SleepingPoolSystem;
use tasksys::{TaskId, TaskSystem};
use tasksys_test_utils::StampLog;

/// Random acyclic batch graphs: batch `i` may only depend on batches `0..i`.
/// Each entry is (sub-task count, raw dependency picks).
fn batch_graph_strategy(max_batches: usize) -> impl Strategy<Value = Vec<(usize, Vec<usize>)>> {
    proptest::collection::vec(
        (0..40usize, proptest::collection::vec(any::<usize>(), 0..4)),
        1..=max_batches,
    )
}

fn sanitize(i: usize, picks: &[usize]) -> BTreeSet<usize> {
    if i == 0 {
        return BTreeSet::new();
    }
    picks.iter().map(|p| p % i).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn random_graphs_run_every_sub_task_once_in_dependency_order(
        graph in batch_graph_strategy(12),
        threads in 1..6usize,
    ) {
        let system = SleepingPoolSystem::new(threads).unwrap();
        let log = StampLog::new();
        let mut ids: Vec<TaskId> = Vec::new();

        for (i, (tasks, picks)) in graph.iter().enumerate() {
            let deps: Vec<TaskId> = sanitize(i, picks).into_iter().map(|d| ids[d]).collect();
            ids.push(system.run_async_with_deps(log.batch(i), *tasks, &deps).unwrap());
        }
        system.sync().unwrap();

        for (i, (tasks, picks)) in graph.iter().enumerate() {
            let mut indices: Vec<usize> = log.stamps_of(i).iter().map(|s| s.index).collect();
            indices.sort_unstable();
            prop_assert_eq!(indices, (0..*tasks).collect::<Vec<_>>());

            for dep in sanitize(i, picks) {
                log.assert_ordered(dep, i);
            }
        }
    }
}
