//! The interface to the embedding platform.
use crate::tick::TickCount;

/// The tick source and critical-section primitive supplied by the embedding
/// firmware.
///
/// A `Platform` implementation is the only piece of target-specific code the
/// timer pool needs. It's usually a unit struct:
///
/// ```
/// use tickpool::Platform;
///
/// struct Board;
///
/// unsafe impl Platform for Board {
///     type Tick = u32;
///
///     fn tick_count() -> u32 {
///         // read the 1 ms tick counter maintained by a timer interrupt
///         0
///     }
///
///     unsafe fn enter_critical() {
///         // save the interrupt-enable state and disable interrupts
///     }
///
///     unsafe fn exit_critical() {
///         // restore the saved interrupt-enable state
///     }
/// }
/// ```
///
/// # Safety
///
/// The timer pool's soundness rests on the following guarantees, which the
/// implementor must uphold:
///
///  - `enter_critical`/`exit_critical` establish mutual exclusion between
///    main-loop code and interrupt-context code for the duration of the
///    bracketed region. On a single-core bare-metal target, disabling
///    interrupts globally is sufficient.
///
///  - The pair nests correctly: `exit_critical` restores the state that was
///    in effect at the matching `enter_critical`, rather than unconditionally
///    re-enabling interrupts. Both must be callable from interrupt context.
///
///  - [`tick_count`] is monotonic (modulo wraparound at `Tick::MAX`) and safe
///    to call from any context, including with interrupts disabled.
///
/// [`tick_count`]: Self::tick_count
pub unsafe trait Platform: Sized + 'static {
    /// The tick counter type.
    ///
    /// `u32` allows periods up to `0x7fff_ffff` ms (~24.8 days). `u16` halves
    /// the per-timer RAM cost in exchange for a 65535 ms period ceiling.
    type Tick: TickCount;

    /// The current tick count — nominally, milliseconds since boot.
    ///
    /// Wraps around at `Tick::MAX`; the pool's tick arithmetic accounts for
    /// that. Must execute in bounded, fast time because it's called on every
    /// [`process`] sweep and on every timer start.
    ///
    /// [`process`]: crate::TimerPool::process
    fn tick_count() -> Self::Tick;

    /// Enter the critical section.
    ///
    /// The pool keeps critical sections extremely short (no loops, no
    /// divisions, no user code), so a global-interrupt-disable implementation
    /// does not cost measurable interrupt latency.
    ///
    /// # Safety
    ///
    /// Only meant to be called by this crate. Each call is paired with
    /// exactly one [`exit_critical`](Self::exit_critical) call.
    unsafe fn enter_critical();

    /// Leave the critical section, restoring the prior interrupt state.
    ///
    /// # Safety
    ///
    /// Only meant to be called by this crate, after a matching
    /// [`enter_critical`](Self::enter_critical).
    unsafe fn exit_critical();
}
