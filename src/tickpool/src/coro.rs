//! Sequential, time-based logic as resumable state machines driven by
//! REPEAT timers.
//!
//! Firmware control flow like "toggle, wait 500 ms, toggle, wait 500 ms" or
//! "request, poll every 10 ms until acknowledged, give up after a second"
//! doesn't need an RTOS task — it needs a place to keep its position between
//! timer callbacks. A [`Coroutine`] is exactly that: a state machine whose
//! [`resume`](Coroutine::resume) runs the next straight-line segment and then
//! says how long to sleep before the next one.
//!
//! ```
//! # struct Board;
//! # unsafe impl tickpool::Platform for Board {
//! #     type Tick = u32;
//! #     fn tick_count() -> u32 { 0 }
//! #     unsafe fn enter_critical() {}
//! #     unsafe fn exit_critical() {}
//! # }
//! use tickpool::{Coroutine, Step};
//!
//! enum Blinker {
//!     LedOn,
//!     LedOff,
//! }
//!
//! impl Coroutine for Blinker {
//!     fn resume(&mut self) -> Step {
//!         match self {
//!             Blinker::LedOn => {
//!                 // led_set(true);
//!                 *self = Blinker::LedOff;
//!                 Step::Wait(100)
//!             }
//!             Blinker::LedOff => {
//!                 // led_set(false);
//!                 *self = Blinker::LedOn;
//!                 Step::Wait(900)
//!             }
//!         }
//!     }
//! }
//! ```
//!
//! The machine is hooked to a timer by calling [`TimerPool::drive`] from the
//! timer's callback; the pool's executing-timer state supplies the handle, so
//! the coroutine never stores it.
//!
//! [`TimerPool::drive`]: crate::TimerPool::drive
use crate::{platform::Platform, pool::TimerPool};

/// What a coroutine asks of its driving timer after a resumption.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Step {
    /// Resume after the given number of ticks, anchored to the previous
    /// scheduled instant. Back-to-back `Wait(p)` steps fire at exact
    /// multiples of `p` with zero cumulative drift, however late each
    /// `process` call runs.
    Wait(u32),
    /// Resume after the given number of ticks, counted from now. Resets the
    /// timer phase; meant for condition-polling loops where drift doesn't
    /// matter.
    Poll(u32),
    /// Resume at the timer's current period, leaving it untouched.
    Yield,
    /// The coroutine has finished. The driving timer keeps running (and
    /// keeps invoking its callback); stop or delete it explicitly if that
    /// should cease.
    Done,
}

/// A resumable state machine.
///
/// Implementations are ordinary enums or structs holding the machine's
/// position and its persistent variables; there is no hidden stack, so state
/// that must survive a wait lives in the machine itself.
pub trait Coroutine {
    /// Run the next segment and report when to resume.
    fn resume(&mut self) -> Step;
}

impl<P: Platform, const N: usize> TimerPool<P, N> {
    /// Advance a coroutine by one step from within a timer callback.
    ///
    /// Binds to the currently executing timer automatically. [`Step::Wait`]
    /// maps to [`advance_period`](Self::advance_period) (zero-drift) and
    /// [`Step::Poll`] to [`set_period`](Self::set_period) (phase reset).
    /// Called outside a timer callback, this is a no-op — there is no timer
    /// to reschedule.
    pub fn drive(&self, coroutine: &mut impl Coroutine) {
        let Some(handle) = self.executing_handle() else {
            return;
        };
        match coroutine.resume() {
            Step::Wait(ticks) => {
                let _ = self.advance_period(handle, ticks);
            }
            Step::Poll(ticks) => {
                let _ = self.set_period(handle, ticks);
            }
            Step::Yield | Step::Done => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Script(u8);

    impl Coroutine for Script {
        fn resume(&mut self) -> Step {
            self.0 += 1;
            match self.0 {
                1 => Step::Wait(100),
                2 => Step::Poll(10),
                _ => Step::Done,
            }
        }
    }

    struct NoPlatform;

    unsafe impl Platform for NoPlatform {
        type Tick = u32;

        fn tick_count() -> u32 {
            0
        }

        unsafe fn enter_critical() {}
        unsafe fn exit_critical() {}
    }

    #[test]
    fn drive_outside_a_callback_does_not_resume() {
        let pool = TimerPool::<NoPlatform, 1>::new();
        let mut script = Script(0);
        pool.drive(&mut script);
        assert_eq!(script.0, 0);
    }
}
