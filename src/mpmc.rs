//! Fixed-capacity multi-producer/multi-consumer queue with per-slot turn sequencing.
//!
//! Grounded on `frenzy::MpmcBoundedQueue`
//! (`examples/original_source/src/lockfree/MpmcBoundedQueue.h`): a ticket is obtained by
//! fetch-adding a 64-bit head/tail counter, split into `turn = ticket / capacity` and
//! `index = ticket % capacity`; each slot carries its own turn counter that alternates
//! producible (even) / consumable (odd).

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

#[repr(align(64))]
struct Slot<T> {
    turn: AtomicU64,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self { turn: AtomicU64::new(0), value: UnsafeCell::new(MaybeUninit::uninit()) }
    }
}

#[repr(align(64))]
struct PaddedTicket(AtomicU64);

/// A bounded, wait-free-for-uncontended-producers MPMC queue.
///
/// FIFO per producer (enforced by fetch-add ordering of the head ticket); no ABA, since
/// tickets are monotonically increasing 64-bit counters. Producers and consumers never
/// block: `try_push`/`try_pop` report full/empty as `false`/`None` rather than errors.
pub struct MpmcQueue<T> {
    slots: Box<[Slot<T>]>,
    capacity: u64,
    head: PaddedTicket,
    tail: PaddedTicket,
}

unsafe impl<T: Send> Send for MpmcQueue<T> {}
unsafe impl<T: Send> Sync for MpmcQueue<T> {}

impl<T> MpmcQueue<T> {
    /// Build a queue with room for exactly `capacity` in-flight elements. `capacity` must be
    /// at least 1.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 1 {
            return Err(Error::invalid_argument("mpmc queue capacity must be at least 1"));
        }
        let slots = (0..capacity).map(|_| Slot::new()).collect::<Vec<_>>().into_boxed_slice();
        Ok(Self {
            slots,
            capacity: capacity as u64,
            head: PaddedTicket(AtomicU64::new(0)),
            tail: PaddedTicket(AtomicU64::new(0)),
        })
    }

    fn turn_of(&self, ticket: u64) -> u64 {
        ticket / self.capacity
    }

    fn index_of(&self, ticket: u64) -> usize {
        (ticket % self.capacity) as usize
    }

    /// Block (busy-wait) until room is available, then push `value`.
    pub fn push(&self, value: T) {
        let ticket = self.head.0.fetch_add(1, Ordering::Relaxed);
        let slot = &self.slots[self.index_of(ticket)];
        let expected = 2 * self.turn_of(ticket);
        while slot.turn.load(Ordering::Acquire) != expected {
            std::hint::spin_loop();
        }
        unsafe { (*slot.value.get()).write(value) };
        slot.turn.store(expected + 1, Ordering::Release);
    }

    /// Non-blocking push. Returns `false` (full) without moving `value` logically forward
    /// if the queue has no free slot right now.
    pub fn try_push(&self, value: T) -> std::result::Result<(), T> {
        let mut ticket = self.head.0.load(Ordering::Acquire);
        loop {
            let slot = &self.slots[self.index_of(ticket)];
            let observed = slot.turn.load(Ordering::Acquire);
            let expected = 2 * self.turn_of(ticket);
            if observed == expected {
                match self.head.0.compare_exchange_weak(
                    ticket,
                    ticket + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*slot.value.get()).write(value) };
                        slot.turn.store(expected + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => ticket = current,
                }
            } else if observed < expected {
                return Err(value); // full
            } else {
                ticket = self.head.0.load(Ordering::Acquire);
            }
        }
    }

    /// Block (busy-wait) until an element is available, then pop it.
    pub fn pop(&self) -> T {
        let ticket = self.tail.0.fetch_add(1, Ordering::Relaxed);
        let slot = &self.slots[self.index_of(ticket)];
        let expected = 2 * self.turn_of(ticket) + 1;
        while slot.turn.load(Ordering::Acquire) != expected {
            std::hint::spin_loop();
        }
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.turn.store(expected + 1, Ordering::Release);
        value
    }

    /// Non-blocking pop. Returns `None` (empty) if no element is available right now.
    pub fn try_pop(&self) -> Option<T> {
        let mut ticket = self.tail.0.load(Ordering::Acquire);
        loop {
            let slot = &self.slots[self.index_of(ticket)];
            let observed = slot.turn.load(Ordering::Acquire);
            let expected = 2 * self.turn_of(ticket) + 1;
            if observed == expected {
                match self.tail.0.compare_exchange_weak(
                    ticket,
                    ticket + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.turn.store(expected + 1, Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => ticket = current,
                }
            } else if observed < expected {
                return None; // empty
            } else {
                ticket = self.tail.0.load(Ordering::Acquire);
            }
        }
    }
}

impl<T> Drop for MpmcQueue<T> {
    fn drop(&mut self) {
        let head = *self.head.0.get_mut();
        let tail = *self.tail.0.get_mut();
        let mut ticket = tail;
        while ticket < head {
            let slot = &mut self.slots[self.index_of(ticket)];
            unsafe { (*slot.value.get()).assume_init_drop() };
            ticket += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn capacity_below_one_rejected() {
        assert!(MpmcQueue::<i32>::new(0).is_err());
    }

    #[test]
    fn fifo_per_producer() {
        let q = MpmcQueue::new(4).unwrap();
        for i in 0..4 {
            q.push(i);
        }
        for i in 0..4 {
            assert_eq!(q.pop(), i);
        }
    }

    #[test]
    fn try_pop_reports_empty() {
        let q: MpmcQueue<i32> = MpmcQueue::new(2).unwrap();
        assert!(q.try_pop().is_none());
    }

    #[test]
    fn try_push_reports_full() {
        let q = MpmcQueue::new(1).unwrap();
        assert!(q.try_push(1).is_ok());
        assert_eq!(q.try_push(2), Err(2));
    }

    #[test]
    fn no_loss_no_duplication_under_contention() {
        let q = Arc::new(MpmcQueue::new(4).unwrap());
        let producers: Vec<_> = (0..2)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        q.push(p * 1000 + i);
                    }
                })
            })
            .collect();

        let consumed = Arc::new(std::sync::Mutex::new(Vec::new()));
        let consumers: Vec<_> = (0..2)
            .map(|_| {
                let q = q.clone();
                let consumed = consumed.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let v = q.pop();
                        consumed.lock().unwrap().push(v);
                    }
                })
            })
            .collect();

        for p in producers {
            p.join().unwrap();
        }
        for c in consumers {
            c.join().unwrap();
        }

        let got: HashSet<_> = consumed.lock().unwrap().iter().copied().collect();
        let expected: HashSet<_> = (0..2000).collect();
        assert_eq!(got, expected);
    }
}
