//! Priority queue of scheduled callbacks advanced by an external clock tick.
//!
//! Grounded on `frenzy::TimerWheel<TTime>`
//! (`examples/original_source/src/thread/TimerWheel.h`): a min-heap of `(due, callback)`
//! entries guarded by a spin mutex; `advance` pops at most one due entry under the lock and
//! invokes its callback outside the lock, so a slow callback never blocks `register_timer`.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;

use crate::sync::SpinLock;

type Callback = Box<dyn FnMut() + Send>;

struct Entry {
    due: u64,
    sequence: u64,
    callback: Callback,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // `BinaryHeap` is a max-heap; reverse both comparisons to get a min-heap by due
        // time, breaking ties by insertion order (earlier sequence dispatches first).
        other.due.cmp(&self.due).then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// A min-heap of due-time-ordered callbacks, advanced manually by the caller's own clock.
pub struct TimerWheel {
    heap: SpinLock<BinaryHeap<Entry>>,
    next_sequence: std::sync::atomic::AtomicU64,
}

impl TimerWheel {
    /// Build an empty wheel.
    pub fn new() -> Self {
        Self { heap: SpinLock::new(BinaryHeap::new()), next_sequence: std::sync::atomic::AtomicU64::new(0) }
    }

    fn insert(&self, due: u64, callback: Callback) {
        let sequence = self.next_sequence.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.heap.with(|heap| heap.push(Entry { due, sequence, callback }));
    }

    /// Register one callback due at `at`.
    pub fn register_timer(&self, at: u64, callback: impl FnMut() + Send + 'static) {
        self.insert(at, Box::new(callback));
    }

    /// Register an arithmetic progression of firings in `[start, end]` stepping by
    /// `interval`, skipping any due time that falls inside `[blackout_start, blackout_end]`
    /// when one is given.
    pub fn register_repeating(
        &self,
        start: u64,
        interval: u64,
        end: u64,
        blackout: Option<(u64, u64)>,
        callback: impl FnMut() + Send + Clone + 'static,
    ) {
        let mut due = start;
        while due <= end {
            let in_blackout = blackout.is_some_and(|(lo, hi)| due >= lo && due <= hi);
            if !in_blackout {
                let mut cb = callback.clone();
                self.insert(due, Box::new(move || cb()));
            }
            due += interval;
        }
    }

    /// Pop and run at most one entry whose due time is `<= now`. Returns whether an entry
    /// was dispatched. The callback runs outside the internal lock, so it may itself call
    /// `register_timer` on this wheel but must not re-enter `advance`.
    pub fn advance(&self, now: u64) -> bool {
        let due_entry = self.heap.with(|heap| match heap.peek() {
            Some(top) if top.due <= now => heap.pop(),
            _ => None,
        });
        match due_entry {
            Some(mut entry) => {
                (entry.callback)();
                true
            }
            None => false,
        }
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn dispatches_in_nondecreasing_due_order() {
        let wheel = TimerWheel::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (label, due) in [(1, 1), (3, 3), (2, 2)] {
            let order = order.clone();
            wheel.register_timer(due, move || order.lock().unwrap().push(label));
        }

        for _ in 0..3 {
            assert!(wheel.advance(4));
        }
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
        assert!(!wheel.advance(4));
    }

    #[test]
    fn advance_before_due_does_not_dispatch() {
        let wheel = TimerWheel::new();
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired_clone = fired.clone();
        wheel.register_timer(10, move || fired_clone.store(true, std::sync::atomic::Ordering::SeqCst));

        assert!(!wheel.advance(5));
        assert!(!fired.load(std::sync::atomic::Ordering::SeqCst));
        assert!(wheel.advance(10));
        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }
}
