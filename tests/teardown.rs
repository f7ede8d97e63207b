// tests/teardown.rs

use std::sync::Arc;

use tasksys::system::{SleepingPoolSystem, SpinningPoolSystem};
use tasksys::types::SystemKind;
use tasksys::{TaskSystem, build};
use tasksys_test_utils::{HitCounter, init_tracing, with_timeout};

#[test]
fn construct_and_drop_without_work_never_hangs() {
    init_tracing();

    with_timeout(20, || {
        for _ in 0..20 {
            for kind in SystemKind::ALL {
                drop(build(kind, 4).unwrap());
            }
        }
    });
}

#[test]
fn explicit_shutdown_joins_all_workers() {
    init_tracing();

    with_timeout(20, || {
        let spinning = SpinningPoolSystem::new(4).unwrap();
        let hits = HitCounter::new(100);
        spinning.run(hits.clone(), 100).unwrap();
        spinning.shutdown().unwrap();
        hits.assert_exactly_once();

        let sleeping = SleepingPoolSystem::new(4).unwrap();
        let hits = HitCounter::new(100);
        sleeping.run(hits.clone(), 100).unwrap();
        sleeping.shutdown().unwrap();
        hits.assert_exactly_once();
    });
}

#[test]
fn shutdown_finishes_unsynced_dependency_chains() {
    init_tracing();

    with_timeout(20, || {
        let system = SleepingPoolSystem::new(2).unwrap();
        let hits = HitCounter::new(64);

        let mut last = system.run_async_with_deps(hits.clone(), 64, &[]).unwrap();
        for _ in 0..4 {
            last = system
                .run_async_with_deps(hits.clone(), 64, &[last])
                .unwrap();
        }
        system.shutdown().unwrap();

        assert_eq!(hits.total_hits(), 5 * 64);
    });
}

#[test]
fn runnable_is_released_once_batches_finish() {
    init_tracing();

    for kind in SystemKind::ALL {
        let system = build(kind, 3).unwrap();
        let hits = HitCounter::new(10);
        system.run(hits.clone(), 10).unwrap();
        system.sync().unwrap();

        // Only our handle is left; workers hold no clone past completion.
        with_timeout(5, {
            let hits = Arc::downgrade(&hits);
            move || {
                while hits.strong_count() > 1 {
                    std::thread::yield_now();
                }
            }
        });
        assert_eq!(Arc::strong_count(&hits), 1, "{kind}");
    }
}
