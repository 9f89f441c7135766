//! Shared sizing constants used across the ring, queue and lock primitives.

/// Default circular buffer capacity in bytes (must be a power of two).
pub const DEFAULT_RING_CAPACITY: usize = 1024 * 1024;

/// Upper bound this crate will allocate for a single ring without an explicit override.
pub const MAX_RING_CAPACITY: usize = 64 * 1024 * 1024;

/// Cache line size for alignment on the overwhelming majority of targets this crate runs on.
pub const CACHE_LINE_SIZE: usize = 64;

/// Page size used to round shared-memory segment sizes.
pub const PAGE_SIZE: usize = 4096;

/// Magic number stamped into a `Ring`'s header, matching the original container layout.
pub const RING_MAGIC: u32 = 0x0010_8023;

/// Magic bytes stamped into a named shared-memory segment header.
pub const SHARED_MEMORY_MAGIC: [u8; 8] = *b"MIDASshm";

/// Fixed contention back-off used by the blocking `Mvcc::update` retry loop.
pub const MVCC_CONTENTION_BACKOFF_MS: u64 = 50;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_capacities_are_powers_of_two() {
        assert!(DEFAULT_RING_CAPACITY.is_power_of_two());
        assert!(MAX_RING_CAPACITY.is_power_of_two());
    }

    #[test]
    fn cache_line_size_is_power_of_two() {
        assert!(CACHE_LINE_SIZE.is_power_of_two());
    }
}
