// tests/system_contract.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use tasksys::types::SystemKind;
use tasksys::{TaskSysError, TaskSystem, build};
use tasksys_test_utils::{HitCounter, init_tracing, with_timeout};

fn each_system(threads: usize) -> Vec<Box<dyn TaskSystem>> {
    SystemKind::ALL
        .iter()
        .map(|&kind| build(kind, threads).expect("valid thread count"))
        .collect()
}

#[test]
fn every_index_runs_exactly_once_for_various_sizes() {
    init_tracing();

    for system in each_system(4) {
        for total in [0, 1, 3, 4, 5, 64, 1000] {
            let hits = HitCounter::new(total);
            system
                .run(Arc::clone(&hits) as Arc<dyn tasksys::Runnable>, total)
                .unwrap_or_else(|e| panic!("{}: run({total}) failed: {e}", system.name()));
            hits.assert_exactly_once();
        }
    }
}

#[test]
fn ten_thousand_tasks_never_double_run_or_skip() {
    init_tracing();

    with_timeout(60, || {
        for system in each_system(8) {
            for _ in 0..5 {
                let hits = HitCounter::new(10_000);
                system.run(hits.clone(), 10_000).unwrap();
                assert!(
                    hits.wrong_indices().is_empty(),
                    "{}: {:?}",
                    system.name(),
                    hits.wrong_indices()
                );
            }
        }
    });
}

#[test]
fn zero_tasks_return_immediately() {
    init_tracing();

    for system in each_system(2) {
        let start = Instant::now();
        let hits = HitCounter::new(0);
        system.run(hits.clone(), 0).unwrap();
        assert_eq!(hits.total_hits(), 0);
        assert!(
            start.elapsed() < Duration::from_secs(1),
            "{} blocked on an empty batch",
            system.name()
        );
    }
}

#[test]
fn single_thread_pools_still_complete() {
    init_tracing();

    with_timeout(20, || {
        for system in each_system(1) {
            let hits = HitCounter::new(257);
            system.run(hits.clone(), 257).unwrap();
            hits.assert_exactly_once();
        }
    });
}

#[test]
fn name_is_stable_across_calls() {
    for system in each_system(2) {
        let first = system.name();
        for _ in 0..3 {
            assert_eq!(system.name(), first);
        }
    }
}

#[test]
fn zero_threads_is_a_construction_error() {
    for kind in SystemKind::ALL {
        assert!(matches!(
            build(kind, 0),
            Err(TaskSysError::InvalidThreadCount(0))
        ));
    }
}

#[test]
fn panics_propagate_to_the_caller_for_every_system() {
    init_tracing();

    for system in each_system(3) {
        let result = system.run(
            Arc::new(|i: usize, _: usize| {
                if i == 5 {
                    panic!("sub-task five failed");
                }
            }),
            20,
        );

        match result {
            Err(TaskSysError::TaskPanicked(fault)) => {
                assert_eq!(fault.index, 5, "{}", system.name());
                assert_eq!(fault.message, "sub-task five failed");
            }
            other => panic!("{}: expected TaskPanicked, got {other:?}", system.name()),
        }

        // The system is still usable afterwards.
        let hits = HitCounter::new(50);
        system.run(hits.clone(), 50).unwrap();
        hits.assert_exactly_once();
    }
}

#[test]
fn concurrent_callers_share_one_system() {
    init_tracing();

    with_timeout(30, || {
        for system in each_system(4) {
            let system: Arc<dyn TaskSystem> = Arc::from(system);
            let counters: Vec<_> = (0..4).map(|_| HitCounter::new(500)).collect();

            std::thread::scope(|scope| {
                for hits in &counters {
                    let system = Arc::clone(&system);
                    scope.spawn(move || system.run(hits.clone(), 500).unwrap());
                }
            });

            for hits in &counters {
                hits.assert_exactly_once();
            }
        }
    });
}

#[test]
fn panic_is_reported_to_the_caller_whose_batch_panicked() {
    init_tracing();

    with_timeout(60, || {
        for system in each_system(2) {
            let system: Arc<dyn TaskSystem> = Arc::from(system);

            for round in 0..20 {
                let hits = HitCounter::new(8);
                let (failing, quiet) = std::thread::scope(|scope| {
                    let failing = scope.spawn(|| {
                        system.run(
                            Arc::new(|i: usize, _: usize| {
                                std::thread::sleep(Duration::from_millis(5));
                                if i == 0 {
                                    panic!("failing caller");
                                }
                            }),
                            1,
                        )
                    });
                    let quiet = scope.spawn(|| system.run(hits.clone(), 8));
                    (failing.join().unwrap(), quiet.join().unwrap())
                });

                let name = system.name();
                assert!(quiet.is_ok(), "{name} round {round}: quiet caller got {quiet:?}");
                assert!(
                    matches!(failing, Err(TaskSysError::TaskPanicked(_))),
                    "{name} round {round}: failing caller got {failing:?}"
                );
                hits.assert_exactly_once();
            }

            system.sync().unwrap();
        }
    });
}
