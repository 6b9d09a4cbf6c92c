//! Lightweight semaphores for signalling into timer-driven coroutines.
//!
//! A [`Semaphore`] is a single byte of shared state: a producer — typically
//! an interrupt handler — calls [`signal`](Semaphore::signal); a consumer
//! coroutine polls it on a timer tick and either proceeds or, after a bounded
//! number of polls, observes a timeout. No waiting happens at this layer; the
//! "blocking" is the coroutine re-arming its poll timer.
//!
//! The whole protocol is load/store only (no read-modify-write), so it's
//! usable on targets without atomic RMW instructions, with one documented
//! consequence: a signal that lands exactly between the consumer's final
//! poll's load and store can be reported as a timeout. Producers that may
//! race the deadline should treat a timeout-then-signal sequence as benign,
//! or use [`signal_if_waiting`](Semaphore::signal_if_waiting) so a timeout
//! indication is never overwritten before the consumer sees it.
use core::sync::atomic::{AtomicI8, Ordering};

const SIGNALED: i8 = 0;
const TIMED_OUT: i8 = -1;

/// Consumer-side view of a semaphore.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SemStatus {
    /// The producer signalled; proceed.
    Signaled,
    /// No signal yet; keep polling.
    Waiting,
    /// The poll budget ran out before a signal arrived.
    TimedOut,
}

/// A counting-down signalling cell shared between a producer (often an
/// interrupt handler) and one polling consumer.
///
/// Starts out signaled, matching a zero-initialized static.
pub struct Semaphore {
    /// `0` = signaled, `> 0` = polls left before timeout, `-1` = timed out.
    state: AtomicI8,
}

impl Semaphore {
    pub const fn new() -> Self {
        Self {
            state: AtomicI8::new(SIGNALED),
        }
    }

    /// Mark the semaphore signaled. A single store; callable from interrupt
    /// context.
    pub fn signal(&self) {
        self.state.store(SIGNALED, Ordering::Release);
    }

    /// Like [`signal`](Self::signal), but leaves a timeout indication in
    /// place for the consumer to observe. For producers whose signal may
    /// arrive after the consumer already gave up.
    pub fn signal_if_waiting(&self) {
        if self.state.load(Ordering::Relaxed) != TIMED_OUT {
            self.state.store(SIGNALED, Ordering::Release);
        }
    }

    /// Arm a timed wait: the consumer gets `polls` calls to
    /// [`poll`](Self::poll) before the wait times out.
    ///
    /// `polls` is clamped to the representable budget (126).
    pub fn begin_wait(&self, polls: u8) {
        let budget = polls.min(i8::MAX as u8 - 1) as i8;
        self.state.store(budget + 1, Ordering::Release);
    }

    /// One polling step of a timed wait.
    ///
    /// Returns [`Waiting`](SemStatus::Waiting) while the budget lasts;
    /// the transition to [`TimedOut`](SemStatus::TimedOut) sticks until the
    /// semaphore is re-armed or signaled.
    pub fn poll(&self) -> SemStatus {
        match self.state.load(Ordering::Acquire) {
            SIGNALED => SemStatus::Signaled,
            TIMED_OUT => SemStatus::TimedOut,
            1 => {
                self.state.store(TIMED_OUT, Ordering::Release);
                SemStatus::TimedOut
            }
            remaining => {
                self.state.store(remaining - 1, Ordering::Release);
                SemStatus::Waiting
            }
        }
    }

    /// The current state, without consuming a poll.
    pub fn status(&self) -> SemStatus {
        match self.state.load(Ordering::Acquire) {
            SIGNALED => SemStatus::Signaled,
            TIMED_OUT => SemStatus::TimedOut,
            _ => SemStatus::Waiting,
        }
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}
