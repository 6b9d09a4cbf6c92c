//! Critical-section-keyed access to shared pool state.
//!
//! All mutable pool state lives in [`CritCell`]s, which can only be read or
//! written through the token carried by a [`CritGuard`]. Acquiring the guard
//! enters the platform critical section; dropping it leaves — on every exit
//! path, including early error returns.
use core::ops;
use tokenlock::UnsyncTokenLock;

use crate::platform::Platform;

pub(crate) struct CritTag<P>(P);

/// The key that "unlocks" [`CritCell`].
pub(crate) type CritToken<P> = tokenlock::UnsyncSingletonToken<CritTag<P>>;

/// The keyhole type for [`UnsyncTokenLock`] that can be "unlocked" by
/// [`CritToken`].
pub(crate) type CritKeyhole<P> = tokenlock::SingletonTokenId<CritTag<P>>;

/// Cell type that can be accessed while the platform critical section is
/// held (i.e., through the token obtained from [`enter`]).
pub(crate) struct CritCell<P, T: ?Sized>(UnsyncTokenLock<T, CritKeyhole<P>>);

impl<P, T> CritCell<P, T> {
    pub(crate) const fn new(x: T) -> Self {
        Self(UnsyncTokenLock::new(CritKeyhole::new(), x))
    }
}

impl<P, T: ?Sized> ops::Deref for CritCell<P, T> {
    type Target = UnsyncTokenLock<T, CritKeyhole<P>>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Enter the platform critical section and get an RAII guard.
pub(crate) fn enter<P: Platform>() -> CritGuard<P> {
    // Safety: paired with the `exit_critical` in `CritGuard::drop`
    unsafe { P::enter_critical() };

    // Safety: the platform critical section gives this context exclusive
    // access to the guarded state, and this crate never nests `enter` calls,
    // so no other token instance can be live at this point. An interrupt
    // handler calling into the pool observes the same exclusivity: it only
    // runs while no main-loop guard exists.
    CritGuard {
        token: unsafe { CritToken::new_unchecked() },
    }
}

/// RAII guard for the platform critical section.
///
/// [`CritToken`] can be borrowed from this type.
pub(crate) struct CritGuard<P: Platform> {
    token: CritToken<P>,
}

impl<P: Platform> Drop for CritGuard<P> {
    #[inline]
    fn drop(&mut self) {
        // Safety: a matching `enter_critical` ran in `enter`
        unsafe { P::exit_critical() };
    }
}

impl<P: Platform> ops::Deref for CritGuard<P> {
    type Target = CritToken<P>;
    fn deref(&self) -> &Self::Target {
        &self.token
    }
}

impl<P: Platform> ops::DerefMut for CritGuard<P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.token
    }
}
