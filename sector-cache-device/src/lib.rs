//! Core sector device abstraction for the sector-cache ecosystem.
//!
//! This crate provides the fundamental [`Device`] trait that defines
//! how block-addressed storage is accessed by [`sector-cache`](https://docs.rs/sector-cache).
//!
//! # Features
//!
//! - `no_std` compatible by default
//! - Async-first design using native async fn in traits
//! - Alignment-aware buffer handling for DMA compatibility
//! - Two trait variants: [`Device`] (single-threaded) and [`SendDevice`] (multi-threaded)
//!
//! # Example
//!
//! ```ignore
//! use sector_cache_device::{Device, SendDevice};
//! use aligned::{Aligned, A32};
//!
//! struct MyDevice;
//!
//! impl Device<512> for MyDevice {
//!     type Error = std::io::Error;
//!     type Align = A32;
//!
//!     async fn read(&mut self, start_sector: u64, data: &mut [Aligned<A32, [u8; 512]>]) -> Result<(), Self::Error> {
//!         // Read implementation
//!         Ok(())
//!     }
//!
//!     async fn write(&mut self, start_sector: u64, data: &[Aligned<A32, [u8; 512]>]) -> Result<(), Self::Error> {
//!         // Write implementation
//!         Ok(())
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![allow(async_fn_in_trait)]

use aligned::Aligned;

/// A trait for sector-addressed storage devices.
///
/// [`Device<const BYTES_PER_SECTOR: usize>`](Device) is parameterized by the
/// device's fixed sector size.
///
/// - `const BYTES_PER_SECTOR`: The number of bytes in one sector for this device.
/// - `type Align`: The [`aligned::Alignment`] of the sector buffers for this implementation.
/// - `type Error`: The error type for the implementation.
///
/// All addresses are zero indexed sector numbers, not byte offsets. Reading
/// `count` sectors starting at sector `s` is expressed by the length of the
/// `data` slice passed to [`Device::read`] — there is no separate count
/// parameter.
///
/// <div class="warning"><b>NOTE to implementors</b>: BYTES_PER_SECTOR <b>must</b> be a multiple of
/// <code>Align</code>'s byte width, so that an array of sectors casts to a byte slice without
/// padding.</div>
///
/// This trait can be implemented multiple times to support devices with different sector sizes.
///
/// # Thread Safety
///
/// This trait generates two variants via [`trait_variant::make`]:
/// - [`Device`] - For single-threaded or `no_std` embedded contexts (no `Send` requirement).
///   The cache built on top of this trait assumes exclusive, non-reentrant access, so this is
///   the variant used throughout `sector-cache`.
/// - [`SendDevice`] - For multi-threaded contexts where futures must be `Send`.
#[trait_variant::make(SendDevice: Send)]
pub trait Device<const BYTES_PER_SECTOR: usize> {
    /// The error type for the Device implementation.
    type Error: core::fmt::Debug;

    /// The alignment requirements of the sector buffers.
    type Align: aligned::Alignment;

    /// Read `data.len()` consecutive sectors starting at `start_sector`.
    ///
    /// The caller is responsible for ensuring `start_sector + data.len() as u64`
    /// does not exceed the device's sector count.
    async fn read(
        &mut self,
        start_sector: u64,
        data: &mut [Aligned<Self::Align, [u8; BYTES_PER_SECTOR]>],
    ) -> Result<(), Self::Error>;

    /// Write `data.len()` consecutive sectors starting at `start_sector`.
    async fn write(
        &mut self,
        start_sector: u64,
        data: &[Aligned<Self::Align, [u8; BYTES_PER_SECTOR]>],
    ) -> Result<(), Self::Error>;
}

/// Cast a byte slice to an aligned slice of sectors.
///
/// This function panics if
///
/// * ALIGNment is not a multiple of BYTES_PER_SECTOR
/// * The input slice is not a multiple of BYTES_PER_SECTOR
/// * The input slice does not have the correct alignment.
pub fn slice_to_sectors<ALIGN, const BYTES_PER_SECTOR: usize>(
    slice: &[u8],
) -> &[Aligned<ALIGN, [u8; BYTES_PER_SECTOR]>]
where
    ALIGN: aligned::Alignment,
{
    let align: usize = core::mem::align_of::<Aligned<ALIGN, ()>>();
    assert!(slice.len() % BYTES_PER_SECTOR == 0);
    assert!(slice.len() % align == 0);
    assert!(slice.as_ptr().cast::<u8>() as usize % align == 0);
    // SAFETY: we check the buf has the correct size and ALIGNment before casting
    unsafe {
        core::slice::from_raw_parts(
            slice.as_ptr() as *const Aligned<ALIGN, [u8; BYTES_PER_SECTOR]>,
            slice.len() / BYTES_PER_SECTOR,
        )
    }
}

/// Cast a mutable byte slice to an aligned mutable slice of sectors.
///
/// Panics under the same conditions as [`slice_to_sectors`].
pub fn slice_to_sectors_mut<ALIGN, const BYTES_PER_SECTOR: usize>(
    slice: &mut [u8],
) -> &mut [Aligned<ALIGN, [u8; BYTES_PER_SECTOR]>]
where
    ALIGN: aligned::Alignment,
{
    let align: usize = core::mem::align_of::<Aligned<ALIGN, [u8; BYTES_PER_SECTOR]>>();
    assert!(slice.len() % BYTES_PER_SECTOR == 0);
    assert!(slice.len() % align == 0);
    assert!(slice.as_ptr().cast::<u8>() as usize % align == 0);
    // SAFETY: we check the buf has the correct size and ALIGNment before casting
    unsafe {
        core::slice::from_raw_parts_mut(
            slice.as_mut_ptr() as *mut Aligned<ALIGN, [u8; BYTES_PER_SECTOR]>,
            slice.len() / BYTES_PER_SECTOR,
        )
    }
}

/// Cast a slice of aligned sectors to a byte slice.
///
/// This function panics if ALIGNment is not a multiple of BYTES_PER_SECTOR.
pub fn sectors_to_slice<ALIGN, const BYTES_PER_SECTOR: usize>(
    buf: &[Aligned<ALIGN, [u8; BYTES_PER_SECTOR]>],
) -> &[u8]
where
    ALIGN: aligned::Alignment,
{
    // We only need to assert that ALIGN is a multiple of BYTES_PER_SECTOR, the other
    // invariants are checked via the type system.
    let align: usize = core::mem::align_of::<Aligned<ALIGN, ()>>();
    assert!(BYTES_PER_SECTOR % align == 0);
    // SAFETY: we check the buf has the correct size and ALIGNment before casting
    unsafe { core::slice::from_raw_parts(buf.as_ptr() as *const u8, buf.len() * BYTES_PER_SECTOR) }
}

/// Cast a mutable slice of aligned sectors to a mutable byte slice.
///
/// This function panics if ALIGNment is not a multiple of BYTES_PER_SECTOR.
pub fn sectors_to_slice_mut<ALIGN, const BYTES_PER_SECTOR: usize>(
    buf: &mut [Aligned<ALIGN, [u8; BYTES_PER_SECTOR]>],
) -> &mut [u8]
where
    ALIGN: aligned::Alignment,
{
    let align: usize = core::mem::align_of::<Aligned<ALIGN, ()>>();
    assert!(BYTES_PER_SECTOR % align == 0);
    // SAFETY: we check the buf has the correct size and ALIGNment before casting
    unsafe { core::slice::from_raw_parts_mut(buf.as_mut_ptr() as *mut u8, buf.len() * BYTES_PER_SECTOR) }
}
