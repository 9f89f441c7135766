//! Single-writer/many-reader wait-free-read cell for trivially copyable values.
//!
//! Grounded on `frenzy::SeqLock<T>` (`examples/original_source/src/lockfree/SeqLock.h`):
//! the writer publishes an odd version before mutating and an even version after; a reader
//! retries whenever it observes an odd version or a version that changed mid-copy.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// A value a single writer updates and any number of readers sample without ever blocking
/// the writer.
///
/// `T` must be `Copy`: reads and writes go through a plain memory copy, matching the
/// original's `memcpy`-based implementation. Padded to 128 bytes so the version counter and
/// payload never share a cache line with unrelated data.
#[repr(align(128))]
pub struct SeqLock<T> {
    version: AtomicU64,
    value: UnsafeCell<T>,
}

unsafe impl<T: Copy + Send> Send for SeqLock<T> {}
unsafe impl<T: Copy + Send> Sync for SeqLock<T> {}

impl<T: Copy> SeqLock<T> {
    /// Wrap `initial` behind a sequence lock, starting at version 0 (published).
    pub fn new(initial: T) -> Self {
        Self { version: AtomicU64::new(0), value: UnsafeCell::new(initial) }
    }

    /// Publish `value`. Must only ever be called by one thread at a time; the type provides
    /// no internal write-side mutual exclusion, matching the original's "writers serialize
    /// externally" contract.
    pub fn write(&self, value: T) {
        let v0 = self.version.load(Ordering::Relaxed);
        self.version.store(v0 + 1, Ordering::Release);
        unsafe { *self.value.get() = value };
        self.version.store(v0 + 2, Ordering::Release);
    }

    /// Wait-free read: loops only while racing a concurrent write, never blocks on a lock.
    pub fn read(&self) -> T {
        loop {
            let v0 = self.version.load(Ordering::Acquire);
            if v0 & 1 != 0 {
                continue;
            }
            let value = unsafe { *self.value.get() };
            let v1 = self.version.load(Ordering::Acquire);
            if v0 == v1 {
                return value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn reads_observe_published_values() {
        let cell = SeqLock::new(0_i64);
        cell.write(42);
        assert_eq!(cell.read(), 42);
    }

    #[test]
    fn concurrent_readers_never_see_torn_or_stale_values() {
        let cell = Arc::new(SeqLock::new(0_i32));
        let writer = {
            let cell = cell.clone();
            thread::spawn(move || {
                for i in 1..=100_000 {
                    cell.write(i);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || {
                    let mut last = 0;
                    for _ in 0..100_000 {
                        let v = cell.read();
                        assert!(v >= last);
                        last = v;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(cell.read(), 100_000);
    }
}
