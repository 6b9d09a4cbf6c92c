//! The timer pool and its operations.
//!
//! # Locking discipline
//!
//! A single platform critical section protects all pool state. Critical
//! sections must stay extremely short — on 8-bit targets they map to a global
//! interrupt disable — so anything expensive happens with the lock released:
//!
//!  - the tick source is read *before* entering the critical section (a
//!    platform's `tick_count` is free to mask interrupts itself);
//!  - the catch-up division for overdue REPEAT timers runs unlocked, and its
//!    result is committed only after re-validating that no interrupt-context
//!    `start`/`stop` touched the slot in the window;
//!  - user callbacks are invoked unlocked, after a short re-validation that
//!    the slot still is what it was when expiry was detected (generation
//!    unchanged, and still active for REPEAT timers).
use core::fmt;

use num_traits::{WrappingAdd, WrappingSub};

use crate::{
    crit::{self, CritCell},
    error::{
        CreateTimerError, DeleteTimerError, SetPeriodError, StartTimerError,
    },
    handle::{self, TimerHandle},
    platform::Platform,
    tick::{self, TickCount},
    utils::Init,
};

#[cfg(feature = "query")]
use crate::error::{QueryError, StopTimerError};

/// Timer expiration callback.
///
/// Invoked from within [`TimerPool::process`], outside the critical section,
/// with the `param` value given to [`TimerPool::create`]. The callback may
/// call pool operations on its own or other timers; it must not call
/// `process` (a nested call is a no-op), and creating or deleting *other*
/// timers from inside a callback is unsupported (documented restriction, not
/// enforced).
pub type TimerFn = fn(usize);

/// When a timer fires: once, or repeatedly at its period.
///
/// Fixed at creation time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    /// Fire once, then become inactive. The slot stays allocated and can be
    /// restarted.
    OneShot,
    /// Fire at every period boundary, phase-locked to the start tick.
    Repeat,
}

impl Init for Mode {
    const INIT: Self = Self::OneShot;
}

/// One pool entry. Only meaningful while the corresponding `used` bit is set.
#[derive(Clone, Copy)]
struct Slot<T> {
    /// Firing interval, in ticks.
    period: T,
    /// Absolute tick at which the timer next fires.
    expire_time: T,
    callback: Option<TimerFn>,
    param: usize,
    mode: Mode,
    /// Whether the slot currently counts down.
    active: bool,
    /// Bumped on every reallocation of this slot; never 0 while allocated.
    generation: u16,
}

impl<T: Init + Copy> Init for Slot<T> {
    const INIT: Self = Self {
        period: T::INIT,
        expire_time: T::INIT,
        callback: None,
        param: 0,
        mode: Mode::INIT,
        active: false,
        generation: 0,
    };
}

struct PoolState<T, const N: usize> {
    slots: [Slot<T>; N],
    /// Bitmap of allocated slots (bit 0 = slot 0).
    used: u32,
    /// Source of slot generations; advanced on each allocation.
    next_generation: u16,
    /// A `process` sweep is underway (re-entry guard).
    in_process: bool,
    /// The timer whose callback is currently running.
    executing: Option<TimerHandle>,
}

impl<T: Init + Copy, const N: usize> Init for PoolState<T, N> {
    const INIT: Self = Self {
        slots: Init::INIT,
        used: 0,
        next_generation: 0,
        in_process: false,
        executing: None,
    };
}

/// A fixed-capacity pool of software timers.
///
/// `P` supplies the tick source and critical-section primitive; `N` is the
/// pool capacity (1–32, checked at compile time). The pool is all-inactive at
/// construction and never reallocates, so it works both as a `static` and as
/// a local in tests:
///
/// ```
/// # struct Board;
/// # unsafe impl tickpool::Platform for Board {
/// #     type Tick = u32;
/// #     fn tick_count() -> u32 { 0 }
/// #     unsafe fn enter_critical() {}
/// #     unsafe fn exit_critical() {}
/// # }
/// use tickpool::TimerPool;
///
/// static POOL: TimerPool<Board, 8> = TimerPool::new();
/// ```
pub struct TimerPool<P: Platform, const N: usize> {
    state: CritCell<P, PoolState<P::Tick, N>>,
}

/// Pool occupancy snapshot.
#[cfg(feature = "query")]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PoolUsage {
    /// Number of allocated slots.
    pub used: usize,
    /// Total number of slots.
    pub capacity: usize,
}

impl<P: Platform, const N: usize> TimerPool<P, N> {
    /// The `used` bitmap is a `u32`; larger capacities must fail to build,
    /// not misbehave at run time.
    const CAPACITY_OK: () = assert!(N >= 1 && N <= 32, "pool capacity must be in 1..=32");

    const INDEX_BITS: u32 = handle::index_bits(N);
    const MAX_GENERATION: u16 = handle::max_generation(Self::INDEX_BITS);

    /// Construct an empty pool.
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_OK;
        Self {
            state: CritCell::new(Init::INIT),
        }
    }

    /// The pool capacity.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Decode `handle` and check it against the current pool state: index in
    /// range, slot allocated, generation matching. The three failure causes
    /// are indistinguishable to callers (the ABA-safety boundary).
    fn slot_index(state: &PoolState<P::Tick, N>, handle: TimerHandle) -> Option<usize> {
        let raw = handle.raw();
        let index = handle::decode_index(raw, Self::INDEX_BITS);
        if index >= N || state.used & (1 << index) == 0 {
            return None;
        }
        if state.slots[index].generation != handle::decode_generation(raw, Self::INDEX_BITS) {
            return None;
        }
        Some(index)
    }

    /// Allocate a timer.
    ///
    /// The timer is initialized but not started; call
    /// [`start`](Self::start) to begin the countdown. `callback` may be
    /// `None` for delay-only usage (the expiry is still tracked and
    /// observable through the query operations). `param` is handed back to
    /// the callback verbatim; ownership of whatever it refers to stays with
    /// the caller.
    ///
    /// Valid periods are `1..=P::Tick::MAX_PERIOD` ticks.
    pub fn create(
        &self,
        period: u32,
        mode: Mode,
        callback: Option<TimerFn>,
        param: usize,
    ) -> Result<TimerHandle, CreateTimerError> {
        if period == 0 || period > P::Tick::MAX_PERIOD {
            return Err(CreateTimerError::BadParam);
        }

        let mut lock = crit::enter::<P>();
        let state = self.state.write(&mut *lock);

        let mut free = None;
        for index in 0..N {
            if state.used & (1 << index) == 0 {
                free = Some(index);
                break;
            }
        }
        let Some(index) = free else {
            return Err(CreateTimerError::PoolFull);
        };

        // Every allocation gets a freshly advanced generation so that a
        // handle captured before a delete+reallocate cycle can't validate
        // against the new occupant. 0 is reserved, and the one encoding that
        // would equal `TimerHandle::INVALID` is skipped.
        let mut generation = state.next_generation;
        loop {
            generation = if generation >= Self::MAX_GENERATION {
                1
            } else {
                generation + 1
            };
            if handle::encode(generation, index, Self::INDEX_BITS) != TimerHandle::INVALID.raw() {
                break;
            }
        }
        state.next_generation = generation;

        state.slots[index] = Slot {
            period: P::Tick::from_period(period),
            expire_time: Init::INIT,
            callback,
            param,
            mode,
            active: false,
            generation,
        };
        state.used |= 1 << index;

        Ok(TimerHandle::from_raw(handle::encode(
            generation,
            index,
            Self::INDEX_BITS,
        )))
    }

    /// Allocate a timer and immediately start it.
    ///
    /// On a start failure the slot is released again, so the caller is left
    /// with either a running timer or nothing.
    pub fn create_started(
        &self,
        period: u32,
        mode: Mode,
        callback: Option<TimerFn>,
        param: usize,
    ) -> Result<TimerHandle, CreateTimerError> {
        let handle = self.create(period, mode, callback, param)?;
        if self.start(handle).is_err() {
            // only reachable if something deleted the timer concurrently
            let _ = self.delete(handle);
            return Err(CreateTimerError::PoolFull);
        }
        Ok(handle)
    }

    /// Start (or restart) the countdown.
    ///
    /// Sets the expiry to `now + period`. Starting an already-active timer
    /// resets its phase from now — see [`advance_period`](Self::advance_period)
    /// for the phase-preserving way to reschedule a running timer.
    pub fn start(&self, handle: TimerHandle) -> Result<(), StartTimerError> {
        // Tick source read before masking interrupts; `tick_count`
        // implementations may take their own critical section.
        let now = P::tick_count();

        let mut lock = crit::enter::<P>();
        let state = self.state.write(&mut *lock);
        let index = Self::slot_index(state, handle).ok_or(StartTimerError::BadHandle)?;
        let slot = &mut state.slots[index];
        slot.expire_time = now.wrapping_add(&slot.period);
        slot.active = true;
        Ok(())
    }

    /// Stop the countdown without releasing the slot.
    ///
    /// The timer can be restarted with [`start`](Self::start). Unlike the
    /// other operations, `stop` distinguishes an unallocated slot
    /// ([`NotFound`](StopTimerError::NotFound)) from an out-of-range index or
    /// stale generation.
    #[cfg(feature = "query")]
    pub fn stop(&self, handle: TimerHandle) -> Result<(), StopTimerError> {
        let mut lock = crit::enter::<P>();
        let state = self.state.write(&mut *lock);

        let raw = handle.raw();
        let index = handle::decode_index(raw, Self::INDEX_BITS);
        if index >= N {
            return Err(StopTimerError::BadHandle);
        }
        if state.used & (1 << index) == 0 {
            return Err(StopTimerError::NotFound);
        }
        if state.slots[index].generation != handle::decode_generation(raw, Self::INDEX_BITS) {
            return Err(StopTimerError::BadHandle);
        }

        state.slots[index].active = false;
        Ok(())
    }

    /// Release the slot.
    ///
    /// The handle becomes invalid. The slot's generation survives until the
    /// next allocation of the slot, so handles kept past this point keep
    /// failing validation even once the slot is reused.
    pub fn delete(&self, handle: TimerHandle) -> Result<(), DeleteTimerError> {
        let mut lock = crit::enter::<P>();
        let state = self.state.write(&mut *lock);
        let index = Self::slot_index(state, handle).ok_or(DeleteTimerError::BadHandle)?;
        state.slots[index].active = false;
        state.used &= !(1 << index);
        Ok(())
    }

    /// Change the period, restarting the countdown from now.
    ///
    /// If the timer is running, the next expiry becomes `now + new_period` —
    /// this deliberately breaks a REPEAT timer's phase lock, which is what's
    /// wanted when an immediate behavioral change is requested (say, a button
    /// press changing a blink rate). If the timer is stopped, only the stored
    /// period changes and takes effect on the next start.
    pub fn set_period(&self, handle: TimerHandle, new_period: u32) -> Result<(), SetPeriodError> {
        if new_period == 0 || new_period > P::Tick::MAX_PERIOD {
            return Err(SetPeriodError::BadParam);
        }
        let now = P::tick_count();

        let mut lock = crit::enter::<P>();
        let state = self.state.write(&mut *lock);
        let index = Self::slot_index(state, handle).ok_or(SetPeriodError::BadHandle)?;
        let slot = &mut state.slots[index];
        slot.period = P::Tick::from_period(new_period);
        if slot.active {
            slot.expire_time = now.wrapping_add(&slot.period);
        }
        Ok(())
    }

    /// Change the period while preserving the timer's phase.
    ///
    /// The next expiry is anchored to the *previously scheduled* instant
    /// (`old_expiry - old_period`), not to now, so repeated calls accumulate
    /// zero drift. This is the primitive behind zero-drift periodic waits: a
    /// callback that calls `advance_period(h, p)` on its own timer fires at
    /// exact multiples of `p` from the original start tick, no matter how
    /// late each `process` call runs.
    ///
    /// If the rebased expiry is already in the past (the main loop was
    /// delayed), it's advanced by whole multiples of `new_period` until it's
    /// in the future, coalescing the missed intervals into one jump. If the
    /// timer is stopped, only the stored period changes.
    pub fn advance_period(
        &self,
        handle: TimerHandle,
        new_period: u32,
    ) -> Result<(), SetPeriodError> {
        if new_period == 0 || new_period > P::Tick::MAX_PERIOD {
            return Err(SetPeriodError::BadParam);
        }
        let now = P::tick_count();
        let new_period_ticks = P::Tick::from_period(new_period);

        let observed_expire;
        let candidate;
        let generation;
        let index;
        {
            let mut lock = crit::enter::<P>();
            let state = self.state.write(&mut *lock);
            index = Self::slot_index(state, handle).ok_or(SetPeriodError::BadHandle)?;
            let slot = &mut state.slots[index];
            let old_period = slot.period;
            slot.period = new_period_ticks;
            if !slot.active {
                // no phase to preserve; effective on the next start
                return Ok(());
            }

            // Rebase on the previously scheduled instant.
            let next = slot
                .expire_time
                .wrapping_sub(&old_period)
                .wrapping_add(&new_period_ticks);
            if now.diff(next) < 0 {
                slot.expire_time = next;
                return Ok(());
            }

            // The consumer was delayed past the rebased instant. The catch-up
            // division must not run with interrupts masked; leave the
            // critical section and re-validate afterwards.
            observed_expire = slot.expire_time;
            candidate = next;
            generation = slot.generation;
        }

        let caught_up = tick::catch_up(candidate, new_period, now);

        let mut lock = crit::enter::<P>();
        let state = self.state.write(&mut *lock);
        if state.used & (1 << index) != 0 {
            let slot = &mut state.slots[index];
            // An interrupt-context start/stop may have raced the division; if
            // so its value wins and the computed expiry is discarded.
            if slot.generation == generation && slot.active && slot.expire_time == observed_expire {
                slot.expire_time = caught_up;
            }
        }
        Ok(())
    }

    /// Process all timers, firing those whose expiry has passed.
    ///
    /// Must be called regularly from the main loop — never from interrupt
    /// context, and never from a timer callback (a nested call returns
    /// immediately instead of recursing). Slots are visited in index order;
    /// timers expiring in the same sweep fire in that order.
    ///
    /// One tick snapshot is taken per call, so every slot is judged against
    /// the same instant. A REPEAT timer whose expiry fell several periods
    /// behind fires once and jumps ahead of the current tick, unless the
    /// crate is built with the `burst` feature, in which case it advances one
    /// period per call and fires once per missed interval.
    pub fn process(&self) {
        {
            let mut lock = crit::enter::<P>();
            let state = self.state.write(&mut *lock);
            if state.in_process {
                return;
            }
            state.in_process = true;
        }

        let now = P::tick_count();

        for index in 0..N {
            self.sweep_slot(index, now);
        }

        let mut lock = crit::enter::<P>();
        self.state.write(&mut *lock).in_process = false;
    }

    /// Examine one slot against the sweep's tick snapshot and fire it if
    /// expired.
    fn sweep_slot(&self, index: usize, now: P::Tick) {
        let bit = 1u32 << index;

        let callback;
        let param;
        let generation;
        let mode;
        #[cfg(not(feature = "burst"))]
        let deferred: Option<(P::Tick, u32)>;

        {
            let mut lock = crit::enter::<P>();
            let state = self.state.write(&mut *lock);
            if state.used & bit == 0 {
                return;
            }
            let slot = &mut state.slots[index];
            if !slot.active || now.diff(slot.expire_time) < 0 {
                return;
            }

            // Expired. Capture what the callback invocation needs, then
            // reschedule (or deactivate) while still under the lock.
            callback = slot.callback;
            param = slot.param;
            generation = slot.generation;
            mode = slot.mode;

            match mode {
                Mode::OneShot => {
                    slot.active = false;
                    #[cfg(not(feature = "burst"))]
                    {
                        deferred = None;
                    }
                }
                Mode::Repeat => {
                    #[cfg(feature = "burst")]
                    {
                        // One period per call; every missed interval gets its
                        // own callback on a later `process` call.
                        let period = slot.period;
                        slot.expire_time = slot.expire_time.wrapping_add(&period);
                    }
                    #[cfg(not(feature = "burst"))]
                    {
                        deferred = Some((slot.expire_time, slot.period.as_u32()));
                    }
                }
            }
        }

        // Coalescing catch-up for REPEAT timers. The division runs with
        // interrupts enabled; the result is committed only if nothing touched
        // the slot in the window.
        #[cfg(not(feature = "burst"))]
        if let Some((expire, period)) = deferred {
            let caught_up = tick::catch_up(expire, period, now);

            let mut lock = crit::enter::<P>();
            let state = self.state.write(&mut *lock);
            if state.used & bit != 0 {
                let slot = &mut state.slots[index];
                if slot.generation == generation && slot.active && slot.expire_time == expire {
                    slot.expire_time = caught_up;
                }
            }
        }

        let Some(callback) = callback else { return };

        // Expiry was detected under an earlier lock and the callback runs
        // under none. Re-validate in between: a stop or delete issued in the
        // window — by an interrupt, or by an earlier callback in this same
        // sweep — must suppress the call.
        let handle = TimerHandle::from_raw(handle::encode(generation, index, Self::INDEX_BITS));
        {
            let mut lock = crit::enter::<P>();
            let state = self.state.write(&mut *lock);
            let valid = state.used & bit != 0 && {
                let slot = &state.slots[index];
                slot.generation == generation && (matches!(mode, Mode::OneShot) || slot.active)
            };
            if !valid {
                return;
            }
            state.executing = Some(handle);
        }

        callback(param);

        let mut lock = crit::enter::<P>();
        self.state.write(&mut *lock).executing = None;
    }

    /// The handle of the timer whose callback is currently executing, or
    /// `None` outside of callback context.
    ///
    /// Lets code invoked (directly or indirectly) from a timer callback
    /// discover which timer is driving it; the coroutine adapter uses this to
    /// bind a state machine to its timer without explicit wiring.
    pub fn executing_handle(&self) -> Option<TimerHandle> {
        let lock = crit::enter::<P>();
        self.state.read(&*lock).executing
    }

    /// Whether the timer is currently counting down.
    #[cfg(feature = "query")]
    pub fn is_running(&self, handle: TimerHandle) -> Result<bool, QueryError> {
        let lock = crit::enter::<P>();
        let state = self.state.read(&*lock);
        let index = Self::slot_index(state, handle).ok_or(QueryError::BadHandle)?;
        Ok(state.slots[index].active)
    }

    /// Ticks until the timer next fires.
    ///
    /// Returns 0 for a stopped timer, and also for one that has expired but
    /// not been processed yet — never a negative-equivalent value.
    #[cfg(feature = "query")]
    pub fn remaining(&self, handle: TimerHandle) -> Result<u32, QueryError> {
        let now = P::tick_count();

        let lock = crit::enter::<P>();
        let state = self.state.read(&*lock);
        let index = Self::slot_index(state, handle).ok_or(QueryError::BadHandle)?;
        let slot = &state.slots[index];
        if !slot.active {
            return Ok(0);
        }
        let diff = slot.expire_time.diff(now);
        Ok(if diff < 0 { 0 } else { diff as u32 })
    }

    /// Pool occupancy.
    #[cfg(feature = "query")]
    pub fn usage(&self) -> PoolUsage {
        let lock = crit::enter::<P>();
        let state = self.state.read(&*lock);
        PoolUsage {
            used: state.used.count_ones() as usize,
            capacity: N,
        }
    }
}

impl<P: Platform, const N: usize> Default for TimerPool<P, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform, const N: usize> fmt::Debug for TimerPool<P, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // copy the summary out and leave the critical section before
        // formatting does any real work
        let lock = crit::enter::<P>();
        let state = self.state.read(&*lock);
        let (used, next_generation, in_process) =
            (state.used, state.next_generation, state.in_process);
        drop(lock);

        f.debug_struct("TimerPool")
            .field("capacity", &N)
            .field("used", &format_args!("{used:#b}"))
            .field("next_generation", &next_generation)
            .field("in_process", &in_process)
            .finish_non_exhaustive()
    }
}
