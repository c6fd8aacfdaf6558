//! A single cache slot: a sector-aligned run of `sectors_per_page` sectors.

extern crate alloc;

use alloc::vec::Vec;
use aligned::{Aligned, Alignment};

/// Sentinel `base` value marking an unused page slot.
pub(crate) const FREE: u64 = u64::MAX;

/// One page table entry.
///
/// `buffer` is always `sectors_per_page` sectors long, allocated once at
/// construction and never resized; only `count` says how much of it holds
/// valid data for the page currently loaded (it can be short when the page
/// butts against the end of the partition).
pub(crate) struct Page<A: Alignment, const BYTES_PER_SECTOR: usize> {
    pub(crate) base: u64,
    pub(crate) count: u32,
    pub(crate) last_access: u32,
    pub(crate) dirty: u64,
    pub(crate) buffer: Vec<Aligned<A, [u8; BYTES_PER_SECTOR]>>,
}

impl<A: Alignment, const BYTES_PER_SECTOR: usize> Page<A, BYTES_PER_SECTOR> {
    /// Allocate a free page with a `sectors_per_page`-sector buffer.
    ///
    /// Returns `None` on allocation failure so the cache constructor can roll
    /// back cleanly instead of aborting the process.
    pub(crate) fn try_new(sectors_per_page: usize) -> Option<Self> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(sectors_per_page).ok()?;
        buffer.resize_with(sectors_per_page, || Aligned([0u8; BYTES_PER_SECTOR]));
        Some(Self {
            base: FREE,
            count: 0,
            last_access: 0,
            dirty: 0,
            buffer,
        })
    }

    #[inline]
    pub(crate) fn is_free(&self) -> bool {
        self.base == FREE
    }

    #[inline]
    pub(crate) fn covers(&self, sector: u64) -> bool {
        !self.is_free() && sector >= self.base && sector < self.base + self.count as u64
    }

    /// Drop this page back to "free" without touching the buffer contents.
    /// Used on invalidate and on a failed (re)load.
    pub(crate) fn reset_free(&mut self) {
        self.base = FREE;
        self.count = 0;
        self.last_access = 0;
        self.dirty = 0;
    }
}
