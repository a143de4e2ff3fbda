//! A contention-tolerant spinlock guarding the global allocator instance.
//!
//! A host GC's own user-facing `GcRwLock`/`GcMutex` wrappers reach for
//! `parking_lot::{Mutex, RwLock}`, the right call for long-held,
//! possibly-blocking application locks. The global allocator instance is
//! different: critical sections are a
//! handful of pointer-sized writes (claim a slot, push a root), contention
//! is expected to be brief, and we'd rather spin through a short hold than
//! pay a syscall for every allocation under light contention. `crossbeam`
//! is already in the dependency graph for its `Backoff` helper, so this
//! hand-rolls a spinlock on top of it instead of pulling in a second
//! locking crate for one call site.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::utils::Backoff;

/// A mutual-exclusion lock that spins (with exponential backoff, then
/// yielding) instead of parking the thread.
pub struct SpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

// SAFETY: `SpinLock<T>` only ever exposes `&mut T` through a guard obtained
// while `locked` is held, exactly like `std::sync::Mutex`.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Wraps `value` in a new, unlocked spinlock.
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
        }
    }

    /// Spins until the lock is acquired, then returns a guard releasing it
    /// on drop.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let backoff = Backoff::new();
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            backoff.snooze();
        }
        SpinLockGuard { lock: self }
    }

    /// Attempts to acquire the lock without spinning, returning `None` if
    /// it is currently held.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|()| SpinLockGuard { lock: self })
    }
}

/// RAII guard releasing a [`SpinLock`] when dropped, including on unwind.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding the guard means the lock is held exclusively.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding the guard means the lock is held exclusively.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_threaded_round_trip() {
        let lock = SpinLock::new(5);
        {
            let mut guard = lock.lock();
            *guard += 1;
        }
        assert_eq!(*lock.lock(), 6);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = SpinLock::new(());
        let guard = lock.lock();
        assert!(lock.try_lock().is_none());
        drop(guard);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let lock = Arc::new(SpinLock::new(0usize));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *lock.lock() += 1;
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(*lock.lock(), 8000);
    }

    #[test]
    fn guard_releases_on_panic_unwind() {
        let lock = Arc::new(SpinLock::new(0usize));
        let poisoned = Arc::clone(&lock);
        let result = std::panic::catch_unwind(move || {
            let mut guard = poisoned.lock();
            *guard += 1;
            panic!("simulated failure while holding the lock");
        });
        assert!(result.is_err());
        // The guard's Drop ran during unwind, so the lock is free again.
        assert!(lock.try_lock().is_some());
    }
}
