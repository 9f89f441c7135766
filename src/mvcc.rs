//! Multi-version shared cell: a pointer to an immutable snapshot, swapped by CAS.
//!
//! Grounded on `frenzy::mvcc<T>` (`examples/original_source/src/nonblock/mvcc.h`). The
//! original swaps a `shared_ptr<snapshot<T>>` atomically; Rust has no atomic `Arc`, so this
//! ports the same technique the rest of this crate already uses for raw pointers: an
//! `AtomicPtr<Snapshot<T>>` holding a strong reference borrowed from `Arc::into_raw`.

use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::constants::MVCC_CONTENTION_BACKOFF_MS;

/// An immutable `(version, value)` pair. `version` increases by exactly one per successful
/// publish.
pub struct Snapshot<T> {
    pub version: u64,
    pub value: T,
}

/// A shared cell readers observe as a sequence of immutable snapshots.
pub struct Mvcc<T> {
    current: AtomicPtr<Snapshot<T>>,
}

unsafe impl<T: Send + Sync> Send for Mvcc<T> {}
unsafe impl<T: Send + Sync> Sync for Mvcc<T> {}

impl<T> Mvcc<T> {
    /// Build a cell whose first snapshot is `(version = 0, value = initial)`.
    pub fn new(initial: T) -> Self {
        let first = Arc::new(Snapshot { version: 0, value: initial });
        Self { current: AtomicPtr::new(Arc::into_raw(first) as *mut Snapshot<T>) }
    }

    /// Acquire the current snapshot. Constant time; the returned `Arc` keeps the snapshot
    /// alive for as long as the caller holds it, even if the cell is updated concurrently.
    pub fn load(&self) -> Arc<Snapshot<T>> {
        loop {
            let ptr = self.current.load(Ordering::Acquire);
            // Bump the refcount without consuming the cell's own strong reference.
            unsafe { Arc::increment_strong_count(ptr) };
            let snapshot = unsafe { Arc::from_raw(ptr) };
            if self.current.load(Ordering::Acquire) == ptr {
                return snapshot;
            }
            // The cell moved on before we could confirm; drop our speculative ref and retry.
            std::mem::forget(snapshot);
            unsafe { Arc::decrement_strong_count(ptr) };
        }
    }

    fn cas_publish(&self, expected: *mut Snapshot<T>, new_value: T, expected_snapshot: &Arc<Snapshot<T>>) -> bool {
        let new_snapshot = Arc::new(Snapshot { version: expected_snapshot.version + 1, value: new_value });
        let new_ptr = Arc::into_raw(new_snapshot) as *mut Snapshot<T>;
        match self.current.compare_exchange(expected, new_ptr, Ordering::AcqRel, Ordering::Acquire) {
            Ok(old_ptr) => {
                unsafe { drop(Arc::from_raw(old_ptr)) };
                true
            }
            Err(_) => {
                unsafe { drop(Arc::from_raw(new_ptr)) };
                false
            }
        }
    }

    /// Publish `value` unconditionally as the next version, retrying until no racing
    /// writer wins first.
    pub fn overwrite(&self, value: T)
    where
        T: Clone,
    {
        loop {
            let current = self.load();
            let expected_ptr = Arc::as_ptr(&current) as *mut Snapshot<T>;
            if self.cas_publish(expected_ptr, value.clone(), &current) {
                return;
            }
        }
    }

    /// Compute `f(version, &value)` and publish the result as the next version.
    ///
    /// `f` may run more than once if it loses the race to a concurrent writer: it must be
    /// pure (no observable side effects), since a losing attempt's output is discarded but
    /// its side effects are not.
    pub fn try_update(&self, f: impl Fn(u64, &T) -> T) -> bool {
        let current = self.load();
        let expected_ptr = Arc::as_ptr(&current) as *mut Snapshot<T>;
        let new_value = f(current.version, &current.value);
        self.cas_publish(expected_ptr, new_value, &current)
    }

    /// Like [`Mvcc::try_update`], but retries with a fixed back-off until it succeeds.
    pub fn update(&self, f: impl Fn(u64, &T) -> T) {
        loop {
            if self.try_update(&f) {
                return;
            }
            std::thread::sleep(Duration::from_millis(MVCC_CONTENTION_BACKOFF_MS));
        }
    }

    /// Like [`Mvcc::update`], but gives up and returns `false` once `deadline` passes.
    pub fn try_update_until(&self, deadline: Instant, f: impl Fn(u64, &T) -> T) -> bool {
        loop {
            if self.try_update(&f) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::hint::spin_loop();
        }
    }
}

impl<T> Drop for Mvcc<T> {
    fn drop(&mut self) {
        let ptr = *self.current.get_mut();
        unsafe { drop(Arc::from_raw(ptr)) };
    }
}
