use std::sync::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: Option<T>,
}

impl<T> Node<T> {
    fn stub() -> *mut Self {
        Box::into_raw(Box::new(Node { next: AtomicPtr::new(std::ptr::null_mut()), value: None }))
    }
}

/// An unbounded MPSC queue that allocates its own linking nodes.
///
/// Same producer/consumer protocol as [`crate::mpsc::IntrusiveMpscQueue`], but the caller
/// pushes bare values rather than node-capable types; this queue boxes and frees the
/// wrapper node around each value itself.
pub struct NonIntrusiveMpscQueue<T> {
    head: std::cell::UnsafeCell<*mut Node<T>>,
    tail: AtomicPtr<Node<T>>,
}

unsafe impl<T: Send> Send for NonIntrusiveMpscQueue<T> {}
unsafe impl<T: Send> Sync for NonIntrusiveMpscQueue<T> {}

impl<T> NonIntrusiveMpscQueue<T> {
    /// Build an empty queue.
    pub fn new() -> Self {
        let stub = Node::<T>::stub();
        Self { head: std::cell::UnsafeCell::new(stub), tail: AtomicPtr::new(stub) }
    }

    /// Enqueue `value`. Lock-free; linearized by the atomic tail exchange.
    pub fn push(&self, value: T) {
        let node = Box::into_raw(Box::new(Node { next: AtomicPtr::new(std::ptr::null_mut()), value: Some(value) }));
        let prev = self.tail.swap(node, Ordering::AcqRel);
        unsafe { (*prev).next.store(node, Ordering::Release) };
    }

    /// Dequeue the oldest value, or `None` if the queue is currently empty.
    ///
    /// Single-consumer only.
    pub fn pop(&self) -> Option<T> {
        unsafe {
            let mut head = *self.head.get();
            let mut next = (*head).next.load(Ordering::Acquire);

            if (*head).value.is_none() && next.is_null() {
                return None;
            }
            if (*head).value.is_none() {
                // head is the stub and a successor exists: skip over it.
                *self.head.get() = next;
                drop(Box::from_raw(head));
                head = next;
                next = (*head).next.load(Ordering::Acquire);
            }

            if !next.is_null() {
                *self.head.get() = next;
                let value = (*head).value.take();
                drop(Box::from_raw(head));
                return value;
            }

            let tail = self.tail.load(Ordering::Acquire);
            if head as *const _ != tail as *const _ {
                loop {
                    let n = (*head).next.load(Ordering::Acquire);
                    if !n.is_null() {
                        *self.head.get() = n;
                        let value = (*head).value.take();
                        drop(Box::from_raw(head));
                        return value;
                    }
                    std::hint::spin_loop();
                }
            }

            // `head` is the only remaining real node and is also the tail: reinsert a stub
            // so future pushes still have something to link from, then return head's value
            // rather than stranding it.
            self.push_stub();
            let n = (*head).next.load(Ordering::Acquire);
            if n.is_null() {
                return None;
            }
            *self.head.get() = n;
            let value = (*head).value.take();
            drop(Box::from_raw(head));
            value
        }
    }

    fn push_stub(&self) {
        let stub = Node::<T>::stub();
        let prev = self.tail.swap(stub, Ordering::AcqRel);
        unsafe { (*prev).next.store(stub, Ordering::Release) };
    }
}

impl<T> Default for NonIntrusiveMpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for NonIntrusiveMpscQueue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
        unsafe { drop(Box::from_raw(*self.head.get())) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_single_producer() {
        let q = NonIntrusiveMpscQueue::new();
        for i in 0..5 {
            q.push(i);
        }
        for i in 0..5 {
            assert_eq!(q.pop(), Some(i));
        }
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn two_thousand_items_no_loss_across_producers() {
        let q = Arc::new(NonIntrusiveMpscQueue::new());
        let producers: Vec<_> = (0..2)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        q.push((p, i));
                    }
                })
            })
            .collect();
        for p in producers {
            p.join().unwrap();
        }

        let mut last_seq = [None; 2];
        let mut count = 0;
        while count < 2000 {
            if let Some((producer, seq)) = q.pop() {
                let idx = producer as usize;
                if let Some(last) = last_seq[idx] {
                    assert!(seq > last);
                }
                last_seq[idx] = Some(seq);
                count += 1;
            }
        }
    }
}
