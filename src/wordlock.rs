//! Reader-optimistic word lock: a single packed 64-bit word safe to place in shared memory.
//!
//! Grounded on `frenzy::WordLock` (`examples/original_source/src/nonblock/WordLock.h`): the
//! low 12 bits are a per-reader-id bitset, the high 52 bits are a version counter. The
//! writer bumps the version odd-then-even around its critical section; readers either take
//! an optimistic pre/post version check or a pessimistic path that claims a reader bit.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

const READER_BITS: u32 = 12;
const READER_MASK: u64 = (1 << READER_BITS) - 1;
const VERSION_STEP: u64 = 1 << READER_BITS;
const DEFAULT_OPTIMISTIC_RETRIES: u32 = 16;

fn now_cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        std::arch::x86_64::_rdtsc()
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        // No stable cycle counter: substitute a monotonic clock, as the original's design
        // notes explicitly allow, preserving the bounded-wait semantics.
        std::time::Instant::now().elapsed().as_nanos() as u64
    }
}

fn version_of(word: u64) -> u64 {
    word >> READER_BITS
}

fn readers_of(word: u64) -> u64 {
    word & READER_MASK
}

fn pack(version: u64, readers: u64) -> u64 {
    (version << READER_BITS) | (readers & READER_MASK)
}

/// A value guarded by a reader-optimistic word lock.
///
/// `T` must be `Copy`; up to twelve concurrent readers are supported, each identified by a
/// caller-assigned id in `0..12`. Not reentrant.
pub struct WordLock<T> {
    word: AtomicU64,
    value: UnsafeCell<T>,
}

unsafe impl<T: Copy + Send> Send for WordLock<T> {}
unsafe impl<T: Copy + Send> Sync for WordLock<T> {}

impl<T: Copy> WordLock<T> {
    /// Wrap `initial` behind a word lock starting at version 0, no readers present.
    pub fn new(initial: T) -> Self {
        Self { word: AtomicU64::new(0), value: UnsafeCell::new(initial) }
    }

    /// Enter the single writer's critical section, waiting (bounded by `deadline_cycles` of
    /// TSC time) for all reader bits to clear.
    ///
    /// Returns `Ok(())` on a clean acquisition. On deadline, forces the version to odd
    /// anyway and returns `Err(Error::Timeout)` — a documented hazard: a reader that is
    /// still mid-copy past the deadline may observe a torn write.
    pub fn writer_enter(&self, deadline_cycles: u64) -> Result<()> {
        let start = now_cycles();
        loop {
            let word = self.word.load(Ordering::Acquire);
            let version = version_of(word);
            if readers_of(word) == 0 {
                let desired = pack(version + 1, 0);
                if self
                    .word
                    .compare_exchange(word, desired, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return Ok(());
                }
                continue;
            }
            if now_cycles().wrapping_sub(start) >= deadline_cycles {
                // Force the version forward regardless of outstanding reader bits.
                let word = self.word.load(Ordering::Acquire);
                let version = version_of(word);
                self.word.store(pack(version + 1, readers_of(word)), Ordering::Release);
                return Err(Error::Timeout);
            }
            std::hint::spin_loop();
        }
    }

    /// Write `value` and leave the critical section entered via [`WordLock::writer_enter`].
    pub fn writer_write_and_leave(&self, value: T) {
        unsafe { *self.value.get() = value };
        let word = self.word.load(Ordering::Relaxed);
        let version = version_of(word);
        self.word.store(pack(version + 1, readers_of(word)), Ordering::Release);
    }

    /// Optimistic read: never takes a lock. Retries up to
    /// [`DEFAULT_OPTIMISTIC_RETRIES`] times, escalating by returning `None` on exhaustion
    /// so the caller can fall back to [`WordLock::read_pessimistic`].
    pub fn read_optimistic(&self) -> Option<T> {
        for _ in 0..DEFAULT_OPTIMISTIC_RETRIES {
            let w0 = self.word.load(Ordering::Acquire);
            if version_of(w0) & 1 != 0 {
                std::hint::spin_loop();
                continue;
            }
            let value = unsafe { *self.value.get() };
            let w1 = self.word.load(Ordering::Acquire);
            if version_of(w1) == version_of(w0) {
                return Some(value);
            }
        }
        None
    }

    /// Pessimistic read: claims `reader_id`'s bit (id must be `< 12`), copies the value,
    /// then clears the bit and confirms no writer ran concurrently. Bounded by
    /// `deadline_cycles` of TSC time; returns `Err(Error::Timeout)` on deadline.
    pub fn read_pessimistic(&self, reader_id: u8, deadline_cycles: u64) -> Result<T> {
        if reader_id >= READER_BITS as u8 {
            return Err(Error::invalid_argument("reader id must be in 0..12"));
        }
        let bit = 1_u64 << reader_id;
        let start = now_cycles();

        loop {
            let word = self.word.load(Ordering::Acquire);
            let version = version_of(word);
            if version & 1 != 0 {
                if now_cycles().wrapping_sub(start) >= deadline_cycles {
                    return Err(Error::Timeout);
                }
                std::hint::spin_loop();
                continue;
            }
            let desired = pack(version, readers_of(word) | bit);
            if self
                .word
                .compare_exchange(word, desired, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }

            let value = unsafe { *self.value.get() };

            loop {
                let after = self.word.load(Ordering::Acquire);
                let cleared = pack(version_of(after), readers_of(after) & !bit);
                match self.word.compare_exchange(after, cleared, Ordering::AcqRel, Ordering::Acquire) {
                    Ok(_) => {
                        if version_of(after) == version {
                            return Ok(value);
                        }
                        break; // writer ran during our window; retry whole read
                    }
                    Err(_) => continue,
                }
            }

            if now_cycles().wrapping_sub(start) >= deadline_cycles {
                return Err(Error::Timeout);
            }
        }
    }
}
