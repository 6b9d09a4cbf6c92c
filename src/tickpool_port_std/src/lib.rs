//! Simulation environment for exercising `tickpool` on a hosted target.
//!
//! Provides deterministic [`Platform`] implementations whose tick counters
//! are set explicitly by the test ([`set_ticks`], [`advance_ticks`]), plus an
//! emulation of interrupt masking: a simulated interrupt raised while a
//! critical section is active is latched and runs the moment the outermost
//! critical section exits — the same instant a real pended IRQ would fire on
//! hardware.
//!
//! All state is thread-local, so the usual one-test-per-thread harness keeps
//! tests isolated without any global reset.
use std::cell::{Cell, RefCell};

use tickpool::Platform;

type Isr = Box<dyn FnOnce()>;

thread_local! {
    static TICKS32: Cell<u32> = Cell::new(0);
    static TICKS16: Cell<u16> = Cell::new(0);

    /// Interrupt-mask nesting depth. Non-zero means "interrupts disabled".
    static MASK_DEPTH: Cell<u32> = Cell::new(0);

    /// Latched interrupts: `(exits_remaining, handler)`. A handler runs when
    /// its counter reaches zero, counting outermost critical-section exits.
    static PENDED: RefCell<Vec<(u32, Isr)>> = RefCell::new(Vec::new());
}

/// Simulated platform with a 32-bit tick counter.
pub struct SimPlatform;

// Safety: all state is confined to one thread, and the mask-depth counter
// faithfully reproduces the single-core interrupt-disable model — simulated
// handlers never run while the depth is non-zero
unsafe impl Platform for SimPlatform {
    type Tick = u32;

    fn tick_count() -> u32 {
        TICKS32.with(|t| t.get())
    }

    unsafe fn enter_critical() {
        mask();
    }

    unsafe fn exit_critical() {
        unmask();
    }
}

/// Simulated platform with a 16-bit tick counter (65.5 s wrap).
pub struct SimPlatform16;

// Safety: see `SimPlatform`
unsafe impl Platform for SimPlatform16 {
    type Tick = u16;

    fn tick_count() -> u16 {
        TICKS16.with(|t| t.get())
    }

    unsafe fn enter_critical() {
        mask();
    }

    unsafe fn exit_critical() {
        unmask();
    }
}

fn mask() {
    MASK_DEPTH.with(|d| d.set(d.get() + 1));
}

fn unmask() {
    let depth = MASK_DEPTH.with(|d| {
        let depth = d
            .get()
            .checked_sub(1)
            .expect("unbalanced critical section");
        d.set(depth);
        depth
    });
    if depth == 0 {
        dispatch_pended();
    }
}

/// Run every latched handler whose exit counter reaches zero, in raise
/// order. Handlers are free to take critical sections of their own.
fn dispatch_pended() {
    let due: Vec<Isr> = PENDED.with(|p| {
        let mut pended = p.borrow_mut();
        for entry in pended.iter_mut() {
            entry.0 -= 1;
        }
        let mut due = Vec::new();
        let mut i = 0;
        while i < pended.len() {
            if pended[i].0 == 0 {
                due.push(pended.remove(i).1);
            } else {
                i += 1;
            }
        }
        due
    });
    for isr in due {
        log::trace!("dispatching simulated interrupt");
        isr();
    }
}

/// Set the 32-bit tick counter.
pub fn set_ticks(value: u32) {
    log::trace!("set_ticks({value})");
    TICKS32.with(|t| t.set(value));
}

/// Advance the 32-bit tick counter, wrapping at the counter width.
pub fn advance_ticks(delta: u32) {
    TICKS32.with(|t| t.set(t.get().wrapping_add(delta)));
}

/// Set the 16-bit tick counter.
pub fn set_ticks16(value: u16) {
    log::trace!("set_ticks16({value})");
    TICKS16.with(|t| t.set(value));
}

/// Advance the 16-bit tick counter, wrapping at the counter width.
pub fn advance_ticks16(delta: u16) {
    TICKS16.with(|t| t.set(t.get().wrapping_add(delta)));
}

/// Raise a simulated interrupt.
///
/// If interrupts are currently enabled (no critical section active) the
/// handler runs immediately, exactly like a hardware IRQ hitting unmasked.
/// Otherwise it's latched and runs when the outermost critical section
/// exits.
pub fn raise_interrupt(isr: impl FnOnce() + 'static) {
    if MASK_DEPTH.with(|d| d.get()) == 0 {
        log::trace!("dispatching simulated interrupt (unmasked)");
        isr();
    } else {
        PENDED.with(|p| p.borrow_mut().push((1, Box::new(isr))));
    }
}

/// Latch a simulated interrupt to fire at the `exits`-th outermost
/// critical-section exit from now (`exits >= 1`).
///
/// This gives tests instruction-level control over *where* inside a
/// multi-section operation an interrupt lands — e.g. between the expiry
/// detection and the callback invocation of one `process` sweep.
pub fn pend_interrupt_after(exits: u32, isr: impl FnOnce() + 'static) {
    assert!(exits >= 1);
    PENDED.with(|p| p.borrow_mut().push((exits, Box::new(isr))));
}

/// Initialize test logging. Safe to call from every test; only the first
/// call takes effect.
pub fn log_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
