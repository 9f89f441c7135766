//! Memory-space abstraction: a region of bytes that a [`crate::ring::Ring`] can be built over,
//! either heap-owned or backed by a named POSIX shared-memory segment.

mod heap;
mod shared;

pub use heap::HeapMemory;
pub use shared::SharedMemory;

/// A contiguous, page-addressable byte region a ring can be laid out over.
///
/// Implemented by [`HeapMemory`] (process-local, heap-allocated) and [`SharedMemory`]
/// (named, `mmap`-backed, attachable from another process). Grounded on
/// `frenzy::HeapMemory` / `frenzy::SharedMemory`.
pub trait MemorySpace {
    /// Pointer to the first byte of the region.
    fn as_ptr(&self) -> *mut u8;

    /// Size of the region in bytes.
    fn capacity(&self) -> usize;

    /// Whether this handle owns the region (and so is responsible for reclaiming it on drop).
    fn is_owning(&self) -> bool;
}
