//! Error types for sector cache operations.

crate::define_adapter_error! {
    /// Error returned by fallible [`Cache`](crate::Cache) operations.
    ///
    /// `construct` is the one operation that does *not* return this type: a
    /// bad constructor argument or an allocation failure yields `None`
    /// instead, matching the "cache handle or none" contract.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum CacheError<E> {
        /// The underlying device reported a read or write failure.
        Io(E) => "device I/O error: {}",
        /// `offset + size` exceeded the cache's sector size.
        OutOfRange { offset: usize, size: usize } => "partial-sector range offset={} size={} exceeds the sector size",
        /// `read_le`/`write_le` was asked for a width other than 1, 2 or 4 bytes.
        UnsupportedWidth { width: u8 } => "unsupported little-endian width {} (expected 1, 2, or 4)",
    }
}
