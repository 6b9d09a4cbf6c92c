#![doc = include_str!("./lib.md")]
#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

mod crit;
mod pool;

pub mod error;
pub mod handle;
pub mod platform;
pub mod tick;
pub mod utils;

#[cfg(feature = "coro")]
pub mod coro;
#[cfg(feature = "coro")]
pub mod sem;

pub use self::{
    error::{
        CreateTimerError, DeleteTimerError, QueryError, ResultCode, SetPeriodError,
        StartTimerError, StopTimerError,
    },
    handle::TimerHandle,
    platform::Platform,
    pool::{Mode, TimerFn, TimerPool},
    tick::TickCount,
};

#[cfg(feature = "query")]
pub use self::pool::PoolUsage;

#[cfg(feature = "coro")]
pub use self::{
    coro::{Coroutine, Step},
    sem::{SemStatus, Semaphore},
};

/// `true` when a REPEAT timer that fell several periods behind coalesces the
/// missed intervals into a single firing (the default), `false` when the
/// `burst` feature makes it fire once per missed interval instead.
pub const COALESCES_MISSED_INTERVALS: bool = !cfg!(feature = "burst");
