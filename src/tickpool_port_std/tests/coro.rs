//! The coroutine adapter: auto-binding, zero-drift waits, polling, and
//! semaphore handshakes.
use std::cell::RefCell;

use tickpool::{Coroutine, Mode, SemStatus, Semaphore, Step, TimerPool};
use tickpool_port_std::{log_init, raise_interrupt, set_ticks, SimPlatform};

type Pool = TimerPool<SimPlatform, 4>;

thread_local! {
    static POOL: Pool = Pool::new();
    static TRACE: RefCell<Vec<(&'static str, u32)>> = RefCell::new(Vec::new());
}

fn trace(label: &'static str) {
    let now = {
        use tickpool::Platform;
        SimPlatform::tick_count()
    };
    TRACE.with(|t| t.borrow_mut().push((label, now)));
}

fn traced() -> Vec<(&'static str, u32)> {
    TRACE.with(|t| t.borrow().clone())
}

/// on → wait 100 → off → wait 900 → on → ...
enum Blinker {
    On,
    Off,
}

impl Coroutine for Blinker {
    fn resume(&mut self) -> Step {
        match self {
            Blinker::On => {
                trace("on");
                *self = Blinker::Off;
                Step::Wait(100)
            }
            Blinker::Off => {
                trace("off");
                *self = Blinker::On;
                Step::Wait(900)
            }
        }
    }
}

#[test]
fn wait_steps_follow_the_script_without_drift() {
    log_init();
    set_ticks(0);

    thread_local! {
        static MACHINE: RefCell<Blinker> = RefCell::new(Blinker::On);
    }

    fn drive(_: usize) {
        POOL.with(|pool| MACHINE.with(|m| pool.drive(&mut *m.borrow_mut())));
    }

    // the driving timer's creation period only sets the first resumption
    POOL.with(|pool| {
        pool.create_started(10, Mode::Repeat, Some(drive), 0).unwrap();
    });

    // process late at every boundary; the Wait steps stay phase-locked
    for &(boundary, slack) in &[(10, 3), (110, 7), (1010, 1), (1110, 9), (2010, 2), (2110, 0)] {
        set_ticks(boundary + slack);
        POOL.with(|pool| pool.process());
    }

    // resumptions observed the late ticks, but the schedule never drifted
    let labels: Vec<_> = traced().iter().map(|(l, _)| *l).collect();
    assert_eq!(labels, vec!["on", "off", "on", "off", "on", "off"]);
}

thread_local! {
    static SEM: Semaphore = Semaphore::new();
}

/// Arms a 5-poll semaphore wait, then polls it every 10 ticks.
struct UartHandshake {
    begun: bool,
}

impl Coroutine for UartHandshake {
    fn resume(&mut self) -> Step {
        if !self.begun {
            self.begun = true;
            SEM.with(|s| s.begin_wait(5));
            trace("await");
            return Step::Poll(10);
        }
        match SEM.with(|s| s.poll()) {
            SemStatus::Waiting => Step::Yield,
            SemStatus::Signaled => {
                trace("data");
                Step::Done
            }
            SemStatus::TimedOut => {
                trace("timeout");
                Step::Done
            }
        }
    }
}

#[test]
fn a_semaphore_signal_releases_the_polling_coroutine() {
    log_init();
    set_ticks(0);

    thread_local! {
        static MACHINE: RefCell<UartHandshake> = RefCell::new(UartHandshake { begun: false });
    }

    fn drive(_: usize) {
        POOL.with(|pool| MACHINE.with(|m| pool.drive(&mut *m.borrow_mut())));
    }

    POOL.with(|pool| {
        pool.create_started(10, Mode::Repeat, Some(drive), 0).unwrap();

        // first resumption arms the wait and switches to 10-tick polling
        set_ticks(10);
        pool.process();

        // two quiet polls
        set_ticks(20);
        pool.process();
        set_ticks(30);
        pool.process();

        // the "receive interrupt" fires between polls
        raise_interrupt(|| SEM.with(|s| s.signal()));

        set_ticks(40);
        pool.process();
    });

    let labels: Vec<_> = traced().iter().map(|(l, _)| *l).collect();
    assert_eq!(labels, vec!["await", "data"]);
}

#[test]
fn an_unsignaled_semaphore_times_out_after_its_poll_budget() {
    log_init();
    set_ticks(0);

    thread_local! {
        static MACHINE: RefCell<UartHandshake> = RefCell::new(UartHandshake { begun: false });
    }

    fn drive(_: usize) {
        POOL.with(|pool| MACHINE.with(|m| pool.drive(&mut *m.borrow_mut())));
    }

    POOL.with(|pool| {
        pool.create_started(10, Mode::Repeat, Some(drive), 0).unwrap();

        // arm, then poll the budget dry
        for tick in 1..=7u32 {
            set_ticks(tick * 10);
            pool.process();
        }
    });

    let labels: Vec<_> = traced().iter().map(|(l, _)| *l).collect();
    assert_eq!(labels, vec!["await", "timeout"]);
    SEM.with(|s| assert_eq!(s.status(), SemStatus::TimedOut));
}

#[test]
fn a_done_coroutine_stays_done_while_its_timer_keeps_firing() {
    log_init();
    set_ticks(0);

    struct OneShotScript {
        resumed: u32,
    }

    impl Coroutine for OneShotScript {
        fn resume(&mut self) -> Step {
            self.resumed += 1;
            trace("step");
            Step::Done
        }
    }

    thread_local! {
        static MACHINE: RefCell<OneShotScript> = RefCell::new(OneShotScript { resumed: 0 });
    }

    fn drive(_: usize) {
        POOL.with(|pool| MACHINE.with(|m| pool.drive(&mut *m.borrow_mut())));
    }

    POOL.with(|pool| {
        pool.create_started(10, Mode::Repeat, Some(drive), 0).unwrap();

        for tick in 1..=3u32 {
            set_ticks(tick * 10);
            pool.process();
        }
    });

    // the timer kept running and kept resuming the machine; staying Done is
    // the machine's own contract
    assert_eq!(MACHINE.with(|m| m.borrow().resumed), 3);
}
