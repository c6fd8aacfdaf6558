//! The cache engine: page table lookup, bypass, flush and invalidate.

extern crate alloc;

use alloc::vec::Vec;
use aligned::Aligned;
use sector_cache_device::{
    sectors_to_slice, sectors_to_slice_mut, slice_to_sectors, slice_to_sectors_mut, Device,
};

use crate::access_clock::AccessClock;
use crate::error::CacheError;
use crate::fmt::warn;
use crate::page::{Page, FREE};

/// A least-recently-used sector cache sitting between a filesystem driver and
/// a block device.
///
/// `D` is the device being cached and `BYTES_PER_SECTOR` is its fixed sector
/// size. The cache borrows the device for `'dev`: it never owns it, matching
/// the collaborator relationship described for the original (the device must
/// outlive every `Cache` built on top of it).
///
/// The cache assumes non-reentrant, single-threaded use — exactly one
/// in-flight call at a time, serialized by whatever lock the caller already
/// holds around the filesystem volume. It performs no internal locking of its
/// own.
pub struct Cache<'dev, D: Device<BYTES_PER_SECTOR>, const BYTES_PER_SECTOR: usize> {
    device: &'dev mut D,
    end_of_partition: u64,
    sectors_per_page: u32,
    pages: Vec<Page<D::Align, BYTES_PER_SECTOR>>,
    access_clock: AccessClock,
}

impl<'dev, D: Device<BYTES_PER_SECTOR>, const BYTES_PER_SECTOR: usize> Cache<'dev, D, BYTES_PER_SECTOR> {
    /// Construct a cache over `device`.
    ///
    /// `number_of_pages` is clamped up to a minimum of 4 and `sectors_per_page`
    /// is clamped into `[32, 64]` (the dirty bitmask is a single `u64`, so it
    /// cannot represent more than 64 sectors per page). Passing `0` for either
    /// is a precondition violation rather than something to clamp away, and
    /// returns `None`, as does an allocation failure — in both cases there is
    /// no partial cache left behind to clean up.
    pub fn new(
        device: &'dev mut D,
        number_of_pages: usize,
        sectors_per_page: usize,
        end_of_partition: u64,
    ) -> Option<Self> {
        if number_of_pages == 0 || sectors_per_page == 0 {
            return None;
        }

        let number_of_pages = number_of_pages.max(4);
        let sectors_per_page = sectors_per_page.clamp(32, 64);

        let mut pages = Vec::new();
        pages.try_reserve_exact(number_of_pages).ok()?;
        for _ in 0..number_of_pages {
            pages.push(Page::try_new(sectors_per_page)?);
        }

        Some(Self {
            device,
            end_of_partition,
            sectors_per_page: sectors_per_page as u32,
            pages,
            access_clock: AccessClock::default(),
        })
    }

    /// Number of sectors grouped into one page.
    pub fn sectors_per_page(&self) -> u32 {
        self.sectors_per_page
    }

    /// Number of page slots in the table.
    pub fn number_of_pages(&self) -> usize {
        self.pages.len()
    }

    /// The fixed sector size this cache was built for.
    pub const fn bytes_per_sector() -> usize {
        BYTES_PER_SECTOR
    }

    #[inline]
    fn sectors_per_page_u64(&self) -> u64 {
        self.sectors_per_page as u64
    }

    /// Flush, consuming the cache.
    ///
    /// This is the "destructor" from the spec: Rust has no async `Drop`, so
    /// the flush-before-free contract is expressed as an explicit consuming
    /// call instead of an implicit one. Any flush failure is logged, not
    /// returned — matching the original, where the destructor has no channel
    /// to report an error either.
    pub async fn close(mut self) {
        if let Err(err) = self.flush().await {
            warn!("sector cache: flush failed during close: {:?}", err);
        }
    }

    /// Find the page whose range intersects `[sector, sector + count)` with
    /// the smallest base sector, or `None` if no loaded page intersects it.
    fn find_page(&self, sector: u64, count: u64) -> Option<usize> {
        let mut lowest = FREE;
        let mut found = None;
        for (i, page) in self.pages.iter().enumerate() {
            if page.is_free() {
                continue;
            }
            let intersect = if sector > page.base {
                sector - page.base < page.count as u64
            } else {
                page.base - sector < count
            };
            if intersect && page.base < lowest {
                lowest = page.base;
                found = Some(i);
            }
        }
        found
    }

    /// Scan the table once for either a hit or the eviction victim.
    ///
    /// Free slots win ties against loaded pages regardless of their
    /// (zeroed) `last_access`, and among candidates of equal `last_access`
    /// the first one encountered is kept — any deterministic tie-break is
    /// valid here, this one simply falls out of a single linear scan.
    fn find_hit_or_victim(&self, sector: u64) -> Result<usize, usize> {
        let mut found_free = false;
        let mut victim = 0usize;
        let mut victim_access = u32::MAX;

        for (i, page) in self.pages.iter().enumerate() {
            if page.covers(sector) {
                return Ok(i);
            }
            if !found_free && (page.is_free() || page.last_access < victim_access) {
                if page.is_free() {
                    found_free = true;
                }
                victim = i;
                victim_access = page.last_access;
            }
        }

        Err(victim)
    }

    /// Write back a page's dirty range, if any, and clear `dirty`.
    ///
    /// Covers from the lowest to the highest set dirty bit inclusive in one
    /// device write, rewriting any clean sectors interleaved between dirty
    /// ones — one I/O per page beats exactly-minimal I/O here.
    async fn writeback(&mut self, idx: usize) -> Result<(), CacheError<D::Error>> {
        let dirty = self.pages[idx].dirty;
        if dirty == 0 {
            return Ok(());
        }

        let first = dirty.trailing_zeros() as u64;
        let span = (64 - dirty.leading_zeros()) as u64 - first;
        let start_sector = self.pages[idx].base + first;
        let slice = &self.pages[idx].buffer[first as usize..(first + span) as usize];

        self.device
            .write(start_sector, slice)
            .await
            .map_err(CacheError::Io)?;

        self.pages[idx].dirty = 0;
        Ok(())
    }

    /// Ensure `sector` is resident in some page, evicting and loading as
    /// needed, and return its index.
    ///
    /// `for_write` requests the write-miss optimization: when the caller is
    /// about to overwrite `[sector, sector + num_sectors)` in full, skip
    /// reading the part of the page that is about to be discarded anyway.
    async fn get_page(
        &mut self,
        sector: u64,
        num_sectors: u64,
        for_write: bool,
    ) -> Result<usize, CacheError<D::Error>> {
        let victim = match self.find_hit_or_victim(sector) {
            Ok(hit) => {
                self.pages[hit].last_access = self.access_clock.tick();
                return Ok(hit);
            }
            Err(victim) => victim,
        };

        if self.pages[victim].dirty != 0 {
            self.writeback(victim).await?;
        }

        let sectors_per_page = self.sectors_per_page_u64();
        let base = (sector / sectors_per_page) * sectors_per_page;
        let page_sectors = (self.end_of_partition.saturating_sub(base)).min(sectors_per_page);
        let local_sector = sector - base;
        let clamped_num = num_sectors.min(page_sectors.saturating_sub(local_sector));

        self.pages[victim].base = base;
        self.pages[victim].count = page_sectors as u32;

        let (mut read_start, mut read_len) = (0u64, page_sectors);

        if for_write {
            if local_sector == 0 && clamped_num == page_sectors {
                // Full-page overwrite: the caller is about to replace every
                // valid sector, so there is nothing worth pre-reading.
                self.pages[victim].last_access = self.access_clock.tick();
                return Ok(victim);
            } else if local_sector == 0 {
                read_start = clamped_num;
                read_len = page_sectors - clamped_num;
            } else if local_sector + clamped_num == page_sectors {
                read_len = page_sectors - clamped_num;
            }
        }

        let dest = &mut self.pages[victim].buffer[read_start as usize..(read_start + read_len) as usize];
        match self.device.read(base + read_start, dest).await {
            Ok(()) => {
                self.pages[victim].last_access = self.access_clock.tick();
                Ok(victim)
            }
            Err(e) => {
                self.pages[victim].reset_free();
                Err(CacheError::Io(e))
            }
        }
    }

    #[inline]
    fn alignment() -> usize {
        core::mem::align_of::<Aligned<D::Align, [u8; BYTES_PER_SECTOR]>>()
    }

    /// Read `num_sectors` sectors starting at `sector` into `dst`.
    ///
    /// Large, page-aligned requests into a sufficiently aligned destination
    /// bypass the cache entirely for the portion that doesn't already
    /// intersect a resident page, streaming straight from the device.
    pub async fn read_sectors(
        &mut self,
        mut sector: u64,
        mut num_sectors: u64,
        dst: &mut [u8],
    ) -> Result<(), CacheError<D::Error>> {
        let mut offset = 0usize;
        let align = Self::alignment();

        while num_sectors > 0 {
            let dst_aligned = (dst.as_ptr() as usize + offset) % align == 0;
            if dst_aligned && sector % self.sectors_per_page_u64() == 0 {
                let bypass = match self.find_page(sector, num_sectors) {
                    None => (num_sectors / self.sectors_per_page_u64()) * self.sectors_per_page_u64(),
                    Some(idx) if self.pages[idx].base > sector => self.pages[idx].base - sector,
                    Some(_) => 0,
                };

                if bypass > 0 {
                    let byte_len = bypass as usize * BYTES_PER_SECTOR;
                    let chunk = slice_to_sectors_mut::<D::Align, BYTES_PER_SECTOR>(
                        &mut dst[offset..offset + byte_len],
                    );
                    self.device.read(sector, chunk).await.map_err(CacheError::Io)?;
                    offset += byte_len;
                    sector += bypass;
                    num_sectors -= bypass;
                    continue;
                }
            }

            let idx = self.get_page(sector, num_sectors, false).await?;
            let local = sector - self.pages[idx].base;
            let take = num_sectors.min(self.pages[idx].count as u64 - local);
            let byte_len = take as usize * BYTES_PER_SECTOR;

            let src = sectors_to_slice::<D::Align, BYTES_PER_SECTOR>(
                &self.pages[idx].buffer[local as usize..(local + take) as usize],
            );
            dst[offset..offset + byte_len].copy_from_slice(src);

            offset += byte_len;
            sector += take;
            num_sectors -= take;
        }

        Ok(())
    }

    /// Write `num_sectors` sectors starting at `sector` from `src`.
    ///
    /// Mirrors [`read_sectors`](Self::read_sectors): large, page-aligned,
    /// aligned-source writes bypass the cache for the portion clear of any
    /// resident page, going straight to the device (so those sectors need no
    /// dirty-bit bookkeeping — they're already durable).
    pub async fn write_sectors(
        &mut self,
        mut sector: u64,
        mut num_sectors: u64,
        src: &[u8],
    ) -> Result<(), CacheError<D::Error>> {
        let mut offset = 0usize;
        let align = Self::alignment();

        while num_sectors > 0 {
            let src_aligned = (src.as_ptr() as usize + offset) % align == 0;
            if src_aligned && sector % self.sectors_per_page_u64() == 0 {
                let bypass = match self.find_page(sector, num_sectors) {
                    None => (num_sectors / self.sectors_per_page_u64()) * self.sectors_per_page_u64(),
                    Some(idx) if self.pages[idx].base > sector => self.pages[idx].base - sector,
                    Some(_) => 0,
                };

                if bypass > 0 {
                    let byte_len = bypass as usize * BYTES_PER_SECTOR;
                    let chunk = slice_to_sectors::<D::Align, BYTES_PER_SECTOR>(
                        &src[offset..offset + byte_len],
                    );
                    self.device.write(sector, chunk).await.map_err(CacheError::Io)?;
                    offset += byte_len;
                    sector += bypass;
                    num_sectors -= bypass;
                    continue;
                }
            }

            let idx = self.get_page(sector, num_sectors, true).await?;
            let local = sector - self.pages[idx].base;
            let take = num_sectors.min(self.pages[idx].count as u64 - local);
            let byte_len = take as usize * BYTES_PER_SECTOR;

            let dest = sectors_to_slice_mut::<D::Align, BYTES_PER_SECTOR>(&mut self.pages[idx].buffer);
            let start = local as usize * BYTES_PER_SECTOR;
            dest[start..start + byte_len].copy_from_slice(&src[offset..offset + byte_len]);

            self.pages[idx].dirty |= span_mask(take as u32) << local;

            offset += byte_len;
            sector += take;
            num_sectors -= take;
        }

        Ok(())
    }

    /// Read `size` bytes at `offset` within `sector` into `dst`.
    ///
    /// Precondition: `offset + size <= BYTES_PER_SECTOR`.
    pub async fn read_partial_sector(
        &mut self,
        dst: &mut [u8],
        sector: u64,
        offset: usize,
        size: usize,
    ) -> Result<(), CacheError<D::Error>> {
        if offset + size > BYTES_PER_SECTOR {
            return Err(CacheError::OutOfRange { offset, size });
        }

        let idx = self.get_page(sector, 1, false).await?;
        let local = (sector - self.pages[idx].base) as usize;
        let bytes = sectors_to_slice::<D::Align, BYTES_PER_SECTOR>(&self.pages[idx].buffer);
        let start = local * BYTES_PER_SECTOR + offset;
        dst[..size].copy_from_slice(&bytes[start..start + size]);
        Ok(())
    }

    /// Read a full sector.
    pub async fn read_sector(&mut self, dst: &mut [u8], sector: u64) -> Result<(), CacheError<D::Error>> {
        self.read_partial_sector(dst, sector, 0, BYTES_PER_SECTOR).await
    }

    /// Write `size` bytes at `offset` within `sector` from `src`, loading the
    /// sector first if it is not already resident.
    ///
    /// Precondition: `offset + size <= BYTES_PER_SECTOR`.
    pub async fn write_partial_sector(
        &mut self,
        src: &[u8],
        sector: u64,
        offset: usize,
        size: usize,
    ) -> Result<(), CacheError<D::Error>> {
        if offset + size > BYTES_PER_SECTOR {
            return Err(CacheError::OutOfRange { offset, size });
        }

        let idx = self.get_page(sector, 1, false).await?;
        let local = (sector - self.pages[idx].base) as usize;
        let bytes = sectors_to_slice_mut::<D::Align, BYTES_PER_SECTOR>(&mut self.pages[idx].buffer);
        let start = local * BYTES_PER_SECTOR + offset;
        bytes[start..start + size].copy_from_slice(&src[..size]);
        self.pages[idx].dirty |= 1u64 << local;
        Ok(())
    }

    /// Write a full sector.
    pub async fn write_sector(&mut self, src: &[u8], sector: u64) -> Result<(), CacheError<D::Error>> {
        self.write_partial_sector(src, sector, 0, BYTES_PER_SECTOR).await
    }

    /// Like [`write_partial_sector`](Self::write_partial_sector), but zero-fills
    /// the whole destination sector before writing `size` bytes at `offset`.
    ///
    /// Requests the write-miss optimization from `get_page` (a full-page
    /// overwrite needs no pre-read), but since this only ever touches one
    /// sector, a page larger than one sector still usually falls through to a
    /// whole-page read — only the single sector being written is zeroed, not
    /// the whole page.
    pub async fn erase_write_partial_sector(
        &mut self,
        src: &[u8],
        sector: u64,
        offset: usize,
        size: usize,
    ) -> Result<(), CacheError<D::Error>> {
        if offset + size > BYTES_PER_SECTOR {
            return Err(CacheError::OutOfRange { offset, size });
        }

        let idx = self.get_page(sector, 1, true).await?;
        let local = (sector - self.pages[idx].base) as usize;
        let bytes = sectors_to_slice_mut::<D::Align, BYTES_PER_SECTOR>(&mut self.pages[idx].buffer);
        let start = local * BYTES_PER_SECTOR;
        bytes[start..start + BYTES_PER_SECTOR].fill(0);
        bytes[start + offset..start + offset + size].copy_from_slice(&src[..size]);
        self.pages[idx].dirty |= 1u64 << local;
        Ok(())
    }

    /// Read a 1, 2, or 4-byte little-endian unsigned integer at `sector`+`offset`.
    pub async fn read_le(
        &mut self,
        sector: u64,
        offset: usize,
        width: u8,
    ) -> Result<u32, CacheError<D::Error>> {
        let mut buf = [0u8; 4];
        match width {
            1 | 2 | 4 => {
                self.read_partial_sector(&mut buf[..width as usize], sector, offset, width as usize)
                    .await?
            }
            _ => return Err(CacheError::UnsupportedWidth { width }),
        }

        Ok(match width {
            1 => buf[0] as u32,
            2 => u16::from_le_bytes([buf[0], buf[1]]) as u32,
            4 => u32::from_le_bytes(buf),
            _ => unreachable!(),
        })
    }

    /// Write a 1, 2, or 4-byte little-endian unsigned integer at `sector`+`offset`.
    pub async fn write_le(
        &mut self,
        sector: u64,
        offset: usize,
        value: u32,
        width: u8,
    ) -> Result<(), CacheError<D::Error>> {
        match width {
            1 | 2 | 4 => {
                let bytes = value.to_le_bytes();
                self.write_partial_sector(&bytes[..width as usize], sector, offset, width as usize)
                    .await
            }
            _ => Err(CacheError::UnsupportedWidth { width }),
        }
    }

    /// Write back every dirty page, one device write per page.
    ///
    /// A failure aborts immediately, leaving the remaining dirty pages
    /// (including the one that just failed) untouched so a retry is
    /// possible.
    pub async fn flush(&mut self) -> Result<(), CacheError<D::Error>> {
        for idx in 0..self.pages.len() {
            if self.pages[idx].dirty != 0 {
                self.writeback(idx).await?;
            }
        }
        Ok(())
    }

    /// Flush, then drop every page's contents.
    ///
    /// The flush result is discarded: the original ignores it too, and there
    /// is no extra information to act on beyond what an explicit
    /// [`flush`](Self::flush) call already reports.
    pub async fn invalidate(&mut self) {
        let _ = self.flush().await;
        for page in &mut self.pages {
            page.reset_free();
        }
    }
}

/// `((1 << k) - 1)`, saturating at `k >= 64` instead of overflowing the shift.
fn span_mask(k: u32) -> u64 {
    if k >= 64 {
        u64::MAX
    } else {
        (1u64 << k) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aligned::A32;

    const SECTOR: usize = 512;

    struct MockDevice {
        data: Vec<u8>,
        reads: Vec<(u64, usize)>,
        writes: Vec<(u64, usize)>,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl MockDevice {
        fn new(num_sectors: u64) -> Self {
            Self {
                data: alloc::vec![0u8; num_sectors as usize * SECTOR],
                reads: Vec::new(),
                writes: Vec::new(),
                fail_reads: false,
                fail_writes: false,
            }
        }
    }

    #[derive(Debug)]
    struct MockError;

    impl Device<SECTOR> for MockDevice {
        type Error = MockError;
        type Align = A32;

        async fn read(
            &mut self,
            start_sector: u64,
            data: &mut [Aligned<A32, [u8; SECTOR]>],
        ) -> Result<(), Self::Error> {
            if self.fail_reads {
                return Err(MockError);
            }
            self.reads.push((start_sector, data.len()));
            let start = start_sector as usize * SECTOR;
            let dst = sectors_to_slice_mut::<A32, SECTOR>(data);
            dst.copy_from_slice(&self.data[start..start + dst.len()]);
            Ok(())
        }

        async fn write(
            &mut self,
            start_sector: u64,
            data: &[Aligned<A32, [u8; SECTOR]>],
        ) -> Result<(), Self::Error> {
            if self.fail_writes {
                return Err(MockError);
            }
            self.writes.push((start_sector, data.len()));
            let start = start_sector as usize * SECTOR;
            let src = sectors_to_slice::<A32, SECTOR>(data);
            self.data[start..start + src.len()].copy_from_slice(src);
            Ok(())
        }
    }

    #[tokio::test]
    async fn hit_after_miss_needs_no_second_read() {
        let mut dev = MockDevice::new(10_000);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        let mut buf = [0u8; SECTOR];
        cache.read_sector(&mut buf, 0).await.unwrap();
        cache.read_sector(&mut buf, 5).await.unwrap();

        assert_eq!(dev.reads.len(), 1);
        assert_eq!(dev.reads[0], (0, 32));
    }

    #[tokio::test]
    async fn lru_eviction_picks_oldest_page() {
        let mut dev = MockDevice::new(10_000);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        let mut buf = [0u8; SECTOR];
        for base in [0u64, 32, 64, 96] {
            cache.read_sector(&mut buf, base).await.unwrap();
        }
        assert_eq!(dev.reads.len(), 4);

        cache.read_sector(&mut buf, 128).await.unwrap();
        assert_eq!(dev.reads.len(), 5);

        cache.read_sector(&mut buf, 0).await.unwrap();
        assert_eq!(dev.reads.len(), 6, "page holding sector 0 should have been evicted");
    }

    #[tokio::test]
    async fn dirty_writes_coalesce_into_one_span() {
        let mut dev = MockDevice::new(10_000);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        cache.write_sector(&[0xAAu8; SECTOR], 10).await.unwrap();
        cache.write_sector(&[0xBBu8; SECTOR], 15).await.unwrap();
        cache.flush().await.unwrap();

        assert_eq!(dev.writes.len(), 1);
        assert_eq!(dev.writes[0], (10, 6));
    }

    #[tokio::test]
    async fn page_at_end_of_partition_is_truncated() {
        let mut dev = MockDevice::new(40);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 40).unwrap();

        let mut buf = [0u8; SECTOR];
        cache.read_sector(&mut buf, 35).await.unwrap();

        assert_eq!(dev.reads.len(), 1);
        assert_eq!(dev.reads[0], (32, 8));
    }

    #[tokio::test]
    async fn large_aligned_read_bypasses_cache() {
        let mut dev = MockDevice::new(10_000);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        // Allocated as aligned sectors, not a raw `Vec<u8>`, so the bypass's
        // alignment check actually has a chance of passing regardless of what
        // the global allocator happens to hand back for a byte vector.
        let mut sectors: Vec<Aligned<A32, [u8; SECTOR]>> =
            core::iter::repeat_with(|| Aligned([0u8; SECTOR])).take(64).collect();
        let buf = sectors_to_slice_mut::<A32, SECTOR>(&mut sectors);
        cache.read_sectors(0, 64, buf).await.unwrap();

        assert_eq!(dev.reads.len(), 1);
        assert_eq!(dev.reads[0], (0, 64));
        assert_eq!(cache.pages.iter().filter(|p| !p.is_free()).count(), 0);
    }

    #[tokio::test]
    async fn write_miss_elision_skips_the_pre_read() {
        let mut dev = MockDevice::new(10_000);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        let buf = alloc::vec![0x42u8; 32 * SECTOR];
        cache.write_sectors(0, 32, &buf).await.unwrap();
        assert_eq!(dev.reads.len(), 0);

        cache.flush().await.unwrap();
        assert_eq!(dev.writes.len(), 1);
        assert_eq!(dev.writes[0], (0, 32));
    }

    #[tokio::test]
    async fn partial_write_preserves_surrounding_bytes() {
        let mut dev = MockDevice::new(10_000);
        {
            let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();
            cache.write_partial_sector(&[1, 2, 3, 4], 0, 100, 4).await.unwrap();
            cache.flush().await.unwrap();
        }

        let mut probe = MockDevice::new(10_000);
        probe.data.copy_from_slice(&dev.data);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut probe, 4, 32, 10_000).unwrap();
        let mut sector = [0u8; SECTOR];
        cache.read_sector(&mut sector, 0).await.unwrap();
        assert_eq!(&sector[100..104], &[1, 2, 3, 4]);
        assert!(sector[..100].iter().all(|&b| b == 0));
        assert!(sector[104..].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn erase_write_zeroes_the_rest_of_the_sector() {
        let mut dev = MockDevice::new(10_000);
        dev.data[..SECTOR].fill(0xFF);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        cache.erase_write_partial_sector(&[9, 9], 0, 10, 2).await.unwrap();
        cache.flush().await.unwrap();

        assert_eq!(&dev.data[10..12], &[9, 9]);
        assert!(dev.data[..10].iter().all(|&b| b == 0));
        assert!(dev.data[12..SECTOR].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn failed_writeback_leaves_victim_dirty_for_retry() {
        let mut dev = MockDevice::new(10_000);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        cache.write_sector(&[7u8; SECTOR], 0).await.unwrap();
        cache.device.fail_writes = true;
        assert!(cache.flush().await.is_err());

        cache.device.fail_writes = false;
        cache.flush().await.unwrap();
        assert_eq!(cache.device.writes.len(), 1);
    }

    #[tokio::test]
    async fn invalidate_without_flush_discards_dirty_state() {
        let mut dev = MockDevice::new(10_000);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        cache.write_sector(&[7u8; SECTOR], 0).await.unwrap();
        cache.invalidate().await;

        assert!(cache.pages.iter().all(|p| p.is_free()));
        assert!(dev.data[..SECTOR].iter().all(|&b| b == 0));
    }

    #[tokio::test]
    async fn read_le_and_write_le_round_trip() {
        let mut dev = MockDevice::new(10_000);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        cache.write_le(0, 4, 0xDEAD, 2).await.unwrap();
        cache.write_le(0, 8, 0xCAFEBABE, 4).await.unwrap();

        assert_eq!(cache.read_le(0, 4, 2).await.unwrap(), 0xDEAD);
        assert_eq!(cache.read_le(0, 8, 4).await.unwrap(), 0xCAFEBABE);
        assert!(matches!(
            cache.read_le(0, 0, 3).await,
            Err(CacheError::UnsupportedWidth { width: 3 })
        ));
    }

    #[tokio::test]
    async fn out_of_range_partial_sector_is_rejected() {
        let mut dev = MockDevice::new(10_000);
        let mut cache: Cache<_, SECTOR> = Cache::new(&mut dev, 4, 32, 10_000).unwrap();

        let mut buf = [0u8; 4];
        let err = cache.read_partial_sector(&mut buf, 0, SECTOR - 2, 4).await;
        assert!(matches!(err, Err(CacheError::OutOfRange { .. })));
    }

    #[test]
    fn construction_rejects_zero_parameters() {
        let mut dev = MockDevice::new(10_000);
        assert!(Cache::<_, SECTOR>::new(&mut dev, 0, 32, 10_000).is_none());
    }

    #[tokio::test]
    async fn construction_clamps_small_parameters() {
        let mut dev = MockDevice::new(10_000);
        let cache: Cache<_, SECTOR> = Cache::new(&mut dev, 1, 8, 10_000).unwrap();
        assert_eq!(cache.number_of_pages(), 4);
        assert_eq!(cache.sectors_per_page(), 32);
    }
}
