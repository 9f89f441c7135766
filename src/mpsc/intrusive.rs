use std::sync::atomic::{AtomicPtr, Ordering};

/// Capability a payload type must implement to be linked into an [`IntrusiveMpscQueue`].
///
/// The queue never allocates: the caller owns every node's storage (typically a `Box<T>`
/// handed to `push` and handed back by `pop`).
pub trait Link: Default {
    /// The embedded forward-link pointer this node's queue membership uses.
    fn next(&self) -> &AtomicPtr<Self>;
}

/// An unbounded MPSC queue whose node type is the client's own payload type.
pub struct IntrusiveMpscQueue<T: Link> {
    stub: Box<T>,
    head: std::cell::UnsafeCell<*mut T>,
    tail: AtomicPtr<T>,
}

unsafe impl<T: Link + Send> Send for IntrusiveMpscQueue<T> {}
unsafe impl<T: Link + Send> Sync for IntrusiveMpscQueue<T> {}

impl<T: Link> IntrusiveMpscQueue<T> {
    /// Build an empty queue.
    pub fn new() -> Self {
        let mut stub = Box::new(T::default());
        stub.next().store(std::ptr::null_mut(), Ordering::Relaxed);
        let stub_ptr: *mut T = &mut *stub;
        Self { stub, head: std::cell::UnsafeCell::new(stub_ptr), tail: AtomicPtr::new(stub_ptr) }
    }

    fn stub_ptr(&self) -> *mut T {
        &*self.stub as *const T as *mut T
    }

    /// Enqueue `node`. Lock-free; linearized by the atomic tail exchange.
    pub fn push(&self, node: Box<T>) {
        let ptr = Box::into_raw(node);
        unsafe { (*ptr).next().store(std::ptr::null_mut(), Ordering::Relaxed) };
        let prev = self.tail.swap(ptr, Ordering::AcqRel);
        unsafe { (*prev).next().store(ptr, Ordering::Release) };
    }

    /// Dequeue the oldest node, or `None` if the queue is currently empty.
    ///
    /// Single-consumer only: calling this from more than one thread concurrently is
    /// undefined behavior, matching the original's single-consumer contract.
    pub fn pop(&self) -> Option<Box<T>> {
        unsafe {
            let mut head = *self.head.get();
            let stub = self.stub_ptr();
            let mut next = (*head).next().load(Ordering::Acquire);

            if head == stub {
                if next.is_null() {
                    return None;
                }
                *self.head.get() = next;
                head = next;
                next = (*head).next().load(Ordering::Acquire);
            }

            if !next.is_null() {
                *self.head.get() = next;
                return Some(Box::from_raw(head));
            }

            let tail = self.tail.load(Ordering::Acquire);
            if head != tail {
                // Producer is mid-link: spin until it finishes.
                loop {
                    let n = (*head).next().load(Ordering::Acquire);
                    if !n.is_null() {
                        *self.head.get() = n;
                        return Some(Box::from_raw(head));
                    }
                    std::hint::spin_loop();
                }
            }

            // Queue logically empty except for `head` itself: reinsert the stub so future
            // pushes still have something to link from, then report empty.
            self.push_stub();
            let n = (*head).next().load(Ordering::Acquire);
            if n.is_null() {
                return None;
            }
            *self.head.get() = n;
            Some(Box::from_raw(head))
        }
    }

    fn push_stub(&self) {
        let stub = self.stub_ptr();
        unsafe { (*stub).next().store(std::ptr::null_mut(), Ordering::Relaxed) };
        let prev = self.tail.swap(stub, Ordering::AcqRel);
        unsafe { (*prev).next().store(stub, Ordering::Release) };
    }
}

impl<T: Link> Default for IntrusiveMpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Link> Drop for IntrusiveMpscQueue<T> {
    fn drop(&mut self) {
        while let Some(node) = self.pop() {
            drop(node);
        }
    }
}
