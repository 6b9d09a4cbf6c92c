//! Long-haul churn: slot reuse, generation cycling, and many-timer sweeps.
use std::cell::RefCell;
use std::collections::HashSet;

use tickpool::{Mode, StartTimerError, TimerPool};
use tickpool_port_std::{log_init, set_ticks, SimPlatform};

thread_local! {
    static EVENTS: RefCell<Vec<usize>> = RefCell::new(Vec::new());
}

fn record(param: usize) {
    EVENTS.with(|e| e.borrow_mut().push(param));
}

fn fired(param: usize) -> usize {
    EVENTS.with(|e| e.borrow().iter().filter(|&&p| p == param).count())
}

#[test]
fn create_delete_churn_never_resurrects_a_handle() {
    log_init();
    let pool = TimerPool::<SimPlatform, 2>::new();

    let mut previous = None;
    for _ in 0..10_000 {
        let h = pool.create(100, Mode::OneShot, None, 0).unwrap();
        if let Some(old) = previous {
            // the handle from the previous round addresses the same slot but
            // must no longer validate
            assert_eq!(pool.start(old), Err(StartTimerError::BadHandle));
            assert_ne!(old, h);
        }
        pool.delete(h).unwrap();
        previous = Some(h);
    }
}

#[test]
fn generation_cycling_skips_zero_and_the_sentinel() {
    log_init();
    // a 32-slot pool has the smallest generation space (11 bits); cycle
    // through it twice on one slot
    let pool = TimerPool::<SimPlatform, 32>::new();
    let mut seen = HashSet::new();
    let mut wrapped = false;

    for round in 0..4100usize {
        let h = pool.create(1, Mode::OneShot, None, 0).unwrap();
        assert_ne!(h, tickpool::TimerHandle::INVALID);
        if !seen.insert(h) {
            // handles may repeat only after a full generation cycle
            assert!(round >= 2046, "premature handle reuse in round {round}");
            wrapped = true;
        }
        pool.delete(h).unwrap();
    }
    assert!(wrapped);
}

#[test]
fn a_full_pool_of_repeat_timers_fires_on_schedule() {
    log_init();
    set_ticks(0);
    let pool = TimerPool::<SimPlatform, 8>::new();

    // period of timer i is 10 * (i + 1)
    for i in 0..8usize {
        pool.create_started((10 * (i + 1)) as u32, Mode::Repeat, Some(record), i)
            .unwrap();
    }

    // step through 4000 ticks, processing at every tick so no boundary is
    // ever missed
    for tick in 1..=4000u32 {
        set_ticks(tick);
        pool.process();
    }

    for i in 0..8usize {
        let period = 10 * (i + 1) as u32;
        assert_eq!(fired(i), (4000 / period) as usize, "timer {i}");
    }
}

#[test]
fn interleaved_lifecycles_keep_unrelated_timers_untouched() {
    log_init();
    set_ticks(0);
    let pool = TimerPool::<SimPlatform, 4>::new();

    let steady = pool.create_started(100, Mode::Repeat, Some(record), 0).unwrap();

    // churn the rest of the pool while the steady timer runs
    for cycle in 1..=50u32 {
        let a = pool.create_started(30, Mode::OneShot, None, 1).unwrap();
        let b = pool.create(70, Mode::Repeat, None, 2).unwrap();

        set_ticks(cycle * 100);
        pool.process();
        assert_eq!(fired(0), cycle as usize);

        pool.delete(a).unwrap();
        pool.delete(b).unwrap();
    }

    assert_eq!(pool.is_running(steady), Ok(true));
    assert_eq!(pool.usage().used, 1);
}
