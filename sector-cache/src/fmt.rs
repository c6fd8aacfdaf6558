//! Logging facade shared by the rest of the crate.
//!
//! Mirrors the `log`/`defmt` duality used elsewhere in the workspace: other
//! modules only ever reach for the macros re-exported here, never `log::*` or
//! `defmt::*` directly, so the crate stays usable with either backend or with
//! neither (logging compiles away to nothing).
//!
//! This module must be declared first in `lib.rs` so the macros are in scope
//! for every module that follows.

#![allow(unused_macros, unused_imports)]

macro_rules! trace {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::trace!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::trace!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ();
        }
    };
}

macro_rules! warn {
    ($($arg:tt)*) => {
        {
            #[cfg(feature = "log")]
            ::log::warn!($($arg)*);
            #[cfg(feature = "defmt")]
            ::defmt::warn!($($arg)*);
            #[cfg(not(any(feature = "log", feature = "defmt")))]
            let _ = ();
        }
    };
}

pub(crate) use trace;
pub(crate) use warn;
