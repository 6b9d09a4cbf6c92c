//! Interrupt-vs-mainline races, driven by the simulated interrupt latch.
//!
//! `pend_interrupt_after(n, ..)` fires a simulated handler at the n-th
//! outermost critical-section exit, which lets a test land an interrupt in a
//! precise window of a `process` sweep. The sections of one sweep over a
//! single expired REPEAT slot close in this order:
//!
//!  1. the re-entry guard is set;
//!  2. expiry is detected and the callback captured;
//!  3. the coalescing catch-up result is committed;
//!  4. the slot is re-validated and marked executing (the callback runs
//!     next, with interrupts enabled).
use std::cell::{Cell, RefCell};

use tickpool::{Mode, TimerHandle, TimerPool};
use tickpool_port_std::{log_init, pend_interrupt_after, raise_interrupt, set_ticks, SimPlatform};

type Pool = TimerPool<SimPlatform, 2>;

thread_local! {
    static POOL: Pool = Pool::new();
    static EVENTS: RefCell<Vec<usize>> = RefCell::new(Vec::new());
    static TARGET: Cell<Option<TimerHandle>> = Cell::new(None);
}

fn record(param: usize) {
    EVENTS.with(|e| e.borrow_mut().push(param));
}

fn fired(param: usize) -> usize {
    EVENTS.with(|e| e.borrow().iter().filter(|&&p| p == param).count())
}

fn target() -> TimerHandle {
    TARGET.with(|t| t.get()).unwrap()
}

#[test]
fn a_stop_landing_between_detection_and_invocation_suppresses_the_callback() {
    log_init();
    set_ticks(0);
    POOL.with(|pool| {
        let h = pool.create_started(100, Mode::Repeat, Some(record), 0).unwrap();
        TARGET.with(|t| t.set(Some(h)));

        set_ticks(100);
        // exit #1 = re-entry guard, exit #2 = expiry detection: the stop
        // lands after the timer was already seen as expired
        pend_interrupt_after(2, || {
            POOL.with(|pool| pool.stop(target()).unwrap());
        });
        pool.process();

        // the pre-invocation re-check caught the stop
        assert_eq!(fired(0), 0);
        assert_eq!(pool.is_running(h), Ok(false));

        // the timer is intact and restartable
        pool.start(h).unwrap();
        set_ticks(200);
        pool.process();
        assert_eq!(fired(0), 1);
    });
}

#[test]
fn a_stop_landing_after_catch_up_still_suppresses_the_callback() {
    log_init();
    if !tickpool::COALESCES_MISSED_INTERVALS {
        // burst builds have no out-of-lock catch-up window in the sweep
        return;
    }
    set_ticks(0);
    POOL.with(|pool| {
        let h = pool.create_started(100, Mode::Repeat, Some(record), 1).unwrap();
        TARGET.with(|t| t.set(Some(h)));

        set_ticks(100);
        // exit #3 closes the catch-up commit; the stop lands just before the
        // pre-invocation re-check
        pend_interrupt_after(3, || {
            POOL.with(|pool| pool.stop(target()).unwrap());
        });
        pool.process();
        assert_eq!(fired(1), 0);
    });
}

#[test]
fn a_delete_landing_in_the_window_suppresses_a_one_shot() {
    log_init();
    set_ticks(0);
    POOL.with(|pool| {
        let h = pool.create_started(100, Mode::OneShot, Some(record), 2).unwrap();
        TARGET.with(|t| t.set(Some(h)));

        set_ticks(100);
        pend_interrupt_after(2, || {
            POOL.with(|pool| pool.delete(target()).unwrap());
        });
        pool.process();

        // generation re-check failed: no callback, and the slot is free
        assert_eq!(fired(2), 0);
        assert_eq!(pool.usage().used, 0);
    });
}

#[test]
fn an_interrupt_start_between_pool_calls_behaves_like_a_mainline_start() {
    log_init();
    set_ticks(0);
    POOL.with(|pool| {
        let h = pool.create(100, Mode::OneShot, Some(record), 3).unwrap();
        TARGET.with(|t| t.set(Some(h)));

        // no critical section is active, so this runs immediately
        raise_interrupt(|| {
            POOL.with(|pool| pool.start(target()).unwrap());
        });

        set_ticks(100);
        pool.process();
        assert_eq!(fired(3), 1);
    });
}

#[test]
fn a_restart_racing_the_catch_up_division_wins() {
    log_init();
    if !tickpool::COALESCES_MISSED_INTERVALS {
        return;
    }
    set_ticks(0);
    POOL.with(|pool| {
        let h = pool.create_started(100, Mode::Repeat, Some(record), 4).unwrap();
        TARGET.with(|t| t.set(Some(h)));

        // fall far behind so the sweep takes the out-of-lock division path,
        // and restart the timer in exactly that window
        set_ticks(555);
        pend_interrupt_after(2, || {
            POOL.with(|pool| pool.start(target()).unwrap());
        });
        pool.process();

        // the restart's phase (555 + 100) survived; the callback still ran
        // because the timer is active with an unchanged generation
        assert_eq!(fired(4), 1);
        assert_eq!(pool.remaining(h), Ok(100));
    });
}
