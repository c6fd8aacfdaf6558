//! An LRU sector cache sitting between a filesystem driver and a block
//! device.
//!
//! [`Cache`] groups sectors into fixed-size pages, keeps a small in-memory
//! page table, and coalesces partial-sector reads/writes into page-sized
//! device I/O. Dirty sectors are tracked with a per-page bitmask and written
//! back as a single contiguous span covering their lowest to highest set bit.
//! Large, page-aligned transfers bypass the cache entirely and stream
//! straight to the device.
//!
//! ```ignore
//! use sector_cache::Cache;
//!
//! let mut device: MyDevice = ...;
//! let mut cache: Cache<_, 512> = Cache::new(&mut device, 8, 32, total_sectors)
//!     .expect("cache construction failed");
//!
//! let mut sector = [0u8; 512];
//! cache.read_sector(&mut sector, 0).await?;
//! cache.write_sector(&sector, 0).await?;
//! cache.flush().await?;
//! cache.close().await;
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

/// Macro to define adapter error types with common boilerplate.
///
/// Generates an error enum with an `Io(E)` variant, a `From<E>` impl, a
/// `Display` impl, and a `core::error::Error` impl. An extended form accepts
/// additional named-field variants, each with its own display message.
///
/// # Example
///
/// ```ignore
/// define_adapter_error! {
///     pub enum MyError<E> {
///         Io(E) => "IO error: {}",
///     }
/// }
/// ```
#[macro_export]
macro_rules! define_adapter_error {
    // Simple case: only Io variant
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident<$err:ident> {
            $(#[$io_meta:meta])*
            Io($io_ty:ident) => $io_msg:literal,
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        #[non_exhaustive]
        $vis enum $name<$err> {
            $(#[$io_meta])*
            Io($io_ty),
        }

        impl<$err> From<$err> for $name<$err> {
            fn from(e: $err) -> Self {
                Self::Io(e)
            }
        }

        impl<$err: core::fmt::Display> core::fmt::Display for $name<$err> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    Self::Io(e) => write!(f, $io_msg, e),
                }
            }
        }

        impl<$err: core::fmt::Debug + core::fmt::Display> core::error::Error for $name<$err> {}
    };

    // Extended case: Io variant plus additional variants
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident<$err:ident> {
            $(#[$io_meta:meta])*
            Io($io_ty:ident) => $io_msg:literal,
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $({ $($field:ident : $field_ty:ty),* $(,)? })? => $variant_msg:literal
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug)]
        #[non_exhaustive]
        $vis enum $name<$err> {
            $(#[$io_meta])*
            Io($io_ty),
            $(
                $(#[$variant_meta])*
                $variant $({ $($field : $field_ty),* })?,
            )+
        }

        impl<$err> From<$err> for $name<$err> {
            fn from(e: $err) -> Self {
                Self::Io(e)
            }
        }

        impl<$err: core::fmt::Display> core::fmt::Display for $name<$err> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    Self::Io(e) => write!(f, $io_msg, e),
                    $(
                        Self::$variant $({ $($field),* })? => write!(f, $variant_msg $(, $($field),*)?),
                    )+
                }
            }
        }

        impl<$err: core::fmt::Debug + core::fmt::Display> core::error::Error for $name<$err> {}
    };
}

// MUST be the first module listed
mod fmt;

mod access_clock;
mod cache;
mod error;
mod page;

pub use cache::Cache;
pub use error::CacheError;

pub use sector_cache_device::{Device, SendDevice};
