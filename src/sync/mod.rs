//! Small synchronization building blocks shared by the higher-level primitives.

mod spinlock;

pub use spinlock::SpinLock;

use parking_lot::{Condvar, Mutex};

/// Mutual exclusion wrapper that serializes every access to a value of type `T`.
///
/// Grounded on `frenzy::Monitor<T>`: the entire public surface is one method,
/// `with`, that runs a closure against the guarded value under the lock.
pub struct Monitor<T> {
    inner: Mutex<T>,
}

impl<T> Monitor<T> {
    /// Wrap `value` behind a monitor.
    pub fn new(value: T) -> Self {
        Self { inner: Mutex::new(value) }
    }

    /// Run `f` against the guarded value, holding the lock for the duration of the call.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}

/// Single-resolution handle returned by [`crate::active::Active::submit`].
///
/// Backed by a `parking_lot::Mutex`/`Condvar` pair rather than a future: the active
/// object's worker thread is the only writer, and `join` blocks the caller until that
/// writer has stored a result (or the task panicked).
pub struct TaskHandle<R> {
    state: std::sync::Arc<(Mutex<Option<std::thread::Result<R>>>, Condvar)>,
}

impl<R> TaskHandle<R> {
    pub(crate) fn new() -> (Self, std::sync::Arc<(Mutex<Option<std::thread::Result<R>>>, Condvar)>) {
        let state = std::sync::Arc::new((Mutex::new(None), Condvar::new()));
        (Self { state: state.clone() }, state)
    }

    /// Block until the submitted task finishes, returning its result or its panic payload.
    pub fn join(self) -> std::thread::Result<R> {
        let (lock, cvar) = &*self.state;
        let mut slot = lock.lock();
        while slot.is_none() {
            cvar.wait(&mut slot);
        }
        slot.take().expect("checked is_none above")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_serializes_access() {
        let m = Monitor::new(0_i32);
        m.with(|v| *v += 1);
        m.with(|v| *v += 1);
        assert_eq!(m.with(|v| *v), 2);
    }
}
