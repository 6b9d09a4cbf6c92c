//! Error types returned by the pool operations.
//!
//! Every operation validates synchronously and reports failure through its
//! return value; there is no panicking path for expected failure modes. The
//! per-operation enums share their discriminants with [`ResultCode`] so that
//! callers bridging to a C-style status word can convert losslessly.
use core::fmt;

macro_rules! define_result_code {
    (
        $( #[$meta:meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta:meta] )*
                $vname:ident = $vd:expr
            ),* $(,)*
        }
    ) => {
        $( #[$meta] )*
        pub enum ResultCode {
            $(
                $( #[$vmeta] )*
                $vname = $vd
            ),*
        }

        impl ResultCode {
            /// Get the short name of the result code.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(
                        Self::$vname => stringify!($vname),
                    )*
                }
            }

            fn fmt(self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl fmt::Debug for ResultCode {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                (*self).fmt(f)
            }
        }
    };
}

define_result_code! {
    /// All result codes (including success) an operation can produce.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[repr(i8)]
    pub enum ResultCode {
        /// The operation was successful.
        Success = 0,
        /// The pool has no free slot left.
        PoolFull = -1,
        /// The handle does not refer to a live timer: the index is out of
        /// range, the slot is unallocated, or the slot was reallocated since
        /// the handle was issued (generation mismatch). The three causes are
        /// deliberately indistinguishable.
        BadHandle = -2,
        /// The slot addressed by the handle is not allocated.
        ///
        /// Only the optional query subsystem distinguishes this from
        /// [`BadHandle`](Self::BadHandle).
        NotFound = -3,
        /// A parameter is out of range (e.g. a period of zero or beyond the
        /// tick type's ceiling).
        BadParam = -4,
    }
}

macro_rules! define_suberror {
    (
        $( #[doc $( $doc:tt )*] )*
        pub enum $Name:ident {
            $( $Variant:ident, )*
        }
    ) => {
        $( #[doc $( $doc )*] )*
        #[repr(i8)]
        #[derive(PartialEq, Eq, Copy, Clone, Hash)]
        pub enum $Name {
            $( $Variant = ResultCode::$Variant as i8 ),*
        }

        impl fmt::Debug for $Name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                ResultCode::from(*self).fmt(f)
            }
        }

        impl From<$Name> for ResultCode {
            #[inline]
            fn from(x: $Name) -> Self {
                match x {
                    $( $Name::$Variant => Self::$Variant ),*
                }
            }
        }
    };
}

define_suberror! {
    /// Error type for [`TimerPool::create`](crate::TimerPool::create) and
    /// [`TimerPool::create_started`](crate::TimerPool::create_started).
    pub enum CreateTimerError {
        BadParam,
        PoolFull,
    }
}

define_suberror! {
    /// Error type for [`TimerPool::start`](crate::TimerPool::start).
    pub enum StartTimerError {
        BadHandle,
    }
}

define_suberror! {
    /// Error type for `TimerPool::stop`.
    pub enum StopTimerError {
        BadHandle,
        NotFound,
    }
}

define_suberror! {
    /// Error type for [`TimerPool::delete`](crate::TimerPool::delete).
    pub enum DeleteTimerError {
        BadHandle,
    }
}

define_suberror! {
    /// Error type for [`TimerPool::set_period`](crate::TimerPool::set_period)
    /// and [`TimerPool::advance_period`](crate::TimerPool::advance_period).
    pub enum SetPeriodError {
        BadHandle,
        BadParam,
    }
}

define_suberror! {
    /// Error type for the query operations.
    pub enum QueryError {
        BadHandle,
    }
}
