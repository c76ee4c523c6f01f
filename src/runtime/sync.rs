//! Locking primitives
//!
//! Each object owns a reentrant [`CriticalSection`]. A [`Synchronizer`]
//! holds it for a scope and releases it when dropped, on every exit path.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};

/// Lock a mutex, recovering the data of a poisoned lock
#[inline]
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read-lock an RwLock, recovering the data of a poisoned lock
#[inline]
pub fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

/// Write-lock an RwLock, recovering the data of a poisoned lock
#[inline]
pub fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Wait on a condition variable, recovering the guard of a poisoned lock
#[inline]
pub fn wait<'a, T>(condvar: &Condvar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    condvar.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

/// Reentrant lock
///
/// The owning thread may enter again; other threads block until every
/// entry has been left.
#[derive(Debug, Default)]
pub struct CriticalSection {
    state: Mutex<LockState>,
    released: Condvar,
}

impl CriticalSection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock, blocking while another thread owns it
    pub fn enter(&self) {
        let me = thread::current().id();
        let mut state = lock(&self.state);
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.depth = 1;
                    return;
                }
                Some(owner) if owner == me => {
                    state.depth += 1;
                    return;
                }
                Some(_) => state = wait(&self.released, state),
            }
        }
    }

    /// Release one level of ownership
    pub fn leave(&self) {
        let mut state = lock(&self.state);
        if state.owner != Some(thread::current().id()) || state.depth == 0 {
            log::warn!("critical section left by a thread that does not own it");
            return;
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
    }

    /// Check if the calling thread owns the lock
    pub fn is_held_by_current_thread(&self) -> bool {
        lock(&self.state).owner == Some(thread::current().id())
    }

    /// Hold the lock until the returned guard is dropped
    pub fn synchronize(&self) -> Synchronizer<'_> {
        self.enter();
        Synchronizer { cs: self }
    }
}

/// Scoped holder of a [`CriticalSection`]
#[must_use = "the lock is released as soon as the synchronizer is dropped"]
pub struct Synchronizer<'a> {
    cs: &'a CriticalSection,
}

impl Drop for Synchronizer<'_> {
    fn drop(&mut self) {
        self.cs.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reentrant() {
        let cs = CriticalSection::new();
        let _outer = cs.synchronize();
        {
            let _inner = cs.synchronize();
            assert!(cs.is_held_by_current_thread());
        }
        assert!(cs.is_held_by_current_thread());
    }

    #[test]
    fn test_released_on_drop() {
        let cs = CriticalSection::new();
        {
            let _sync = cs.synchronize();
        }
        assert!(!cs.is_held_by_current_thread());
    }

    #[test]
    fn test_released_on_early_return() {
        fn fails(cs: &CriticalSection) -> Result<(), ()> {
            let _sync = cs.synchronize();
            Err(())
        }
        let cs = CriticalSection::new();
        assert!(fails(&cs).is_err());
        assert!(!cs.is_held_by_current_thread());
    }

    #[test]
    fn test_mutual_exclusion() {
        let cs = Arc::new(CriticalSection::new());
        let counter = Arc::new(Mutex::new(0u64));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cs = Arc::clone(&cs);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let _sync = cs.synchronize();
                        let v = *lock(&counter);
                        thread::yield_now();
                        *lock(&counter) = v + 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock(&counter), 4000);
    }
}
