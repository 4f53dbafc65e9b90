/*!
 * Mutex
 *
 * Exclusive capability lock: a two-bit atomic state word plus a parking-lot
 * wait queue keyed by the state's address.
 *
 * # State Word
 *
 * - `LOCKED_BIT`: someone holds the lock
 * - `PARKED_BIT`: at least one thread is (or is about to be) parked
 *
 * Uncontended lock and unlock are a single atomic operation each. A
 * contended `lock` spins with bounded backoff, then sets `PARKED_BIT` and
 * parks; `unlock` only touches the parking lot when `PARKED_BIT` was set.
 *
 * Ownership is not tracked: any thread may unlock a held mutex, and a
 * holder that locks again deadlocks.
 */

use super::traits::Locker;
use crate::core::errors::{fault, SyncError, SyncResult};
use crate::core::sync::config::SyncConfig;
use crate::core::sync::wait::{SpinPolicy, SpinWait};
use parking_lot_core::{park, unpark_one, ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

const LOCKED_BIT: u8 = 0b01;
const PARKED_BIT: u8 = 0b10;

/// Exclusive lock without ownership tracking
pub struct Mutex {
    state: AtomicU8,
    spin: SpinPolicy,
}

impl Mutex {
    /// Create an unlocked mutex with the default spin policy
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(0),
            spin: SpinPolicy::DEFAULT,
        }
    }

    /// Create a mutex that is already held by the caller
    pub const fn new_locked() -> Self {
        Self {
            state: AtomicU8::new(LOCKED_BIT),
            spin: SpinPolicy::DEFAULT,
        }
    }

    /// Create an unlocked mutex whose contention strategy follows `config`
    pub fn with_config(config: &SyncConfig) -> Self {
        Self {
            state: AtomicU8::new(0),
            spin: SpinPolicy::from_config(config),
        }
    }

    #[inline]
    fn key(&self) -> usize {
        &self.state as *const AtomicU8 as usize
    }

    /// Block until the mutex is held
    #[inline]
    pub fn lock(&self) {
        if self
            .state
            .compare_exchange_weak(0, LOCKED_BIT, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_slow();
        }
    }

    /// Acquire without blocking; returns false if already held
    #[inline]
    pub fn try_lock(&self) -> bool {
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            if state & LOCKED_BIT != 0 {
                return false;
            }
            match self.state.compare_exchange_weak(
                state,
                state | LOCKED_BIT,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => state = actual,
            }
        }
    }

    /// Release the mutex
    ///
    /// # Panics
    ///
    /// Unlocking a mutex that is not held is a usage fault.
    #[inline]
    #[track_caller]
    pub fn unlock(&self) {
        if let Err(err) = self.checked_unlock() {
            fault(err);
        }
    }

    /// Release the mutex, reporting a double unlock instead of panicking
    ///
    /// On error the state is left untouched.
    #[inline]
    pub fn checked_unlock(&self) -> SyncResult<()> {
        // Clearing an already-clear bit is a no-op, so the error path
        // never mutates the state
        let prev = self.state.fetch_and(!LOCKED_BIT, Ordering::Release);
        if prev & LOCKED_BIT == 0 {
            return Err(SyncError::UnlockOfUnlocked);
        }
        if prev & PARKED_BIT != 0 {
            self.unlock_slow();
        }
        Ok(())
    }

    /// Lock and return a guard that unlocks on drop
    #[inline]
    pub fn guard(&self) -> MutexGuard<'_> {
        self.lock();
        MutexGuard { mutex: self }
    }

    /// Non-blocking variant of [`Mutex::guard`]
    #[inline]
    pub fn try_guard(&self) -> Option<MutexGuard<'_>> {
        self.try_lock().then_some(MutexGuard { mutex: self })
    }

    /// Whether the mutex is currently held (diagnostics only)
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) & LOCKED_BIT != 0
    }

    #[cold]
    fn lock_slow(&self) {
        let mut spin = SpinWait::new(self.spin);
        let mut state = self.state.load(Ordering::Relaxed);

        loop {
            // Grab the lock if it is free, even if others are parked
            if state & LOCKED_BIT == 0 {
                match self.state.compare_exchange_weak(
                    state,
                    state | LOCKED_BIT,
                    Ordering::Acquire,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => return,
                    Err(actual) => state = actual,
                }
                continue;
            }

            // Spin only while nobody is parked yet
            if state & PARKED_BIT == 0 && spin.spin() {
                state = self.state.load(Ordering::Relaxed);
                continue;
            }

            if state & PARKED_BIT == 0 {
                if let Err(actual) = self.state.compare_exchange_weak(
                    state,
                    state | PARKED_BIT,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    state = actual;
                    continue;
                }
            }

            let validate = || self.state.load(Ordering::Relaxed) == LOCKED_BIT | PARKED_BIT;

            // SAFETY: the key is our own state address, which outlives the
            // park since we borrow self; callbacks do not panic or park
            let result = unsafe {
                park(
                    self.key(),
                    validate,
                    || {},
                    |_, _| {},
                    DEFAULT_PARK_TOKEN,
                    None,
                )
            };
            debug_assert!(!matches!(result, ParkResult::TimedOut));

            spin.reset();
            state = self.state.load(Ordering::Relaxed);
        }
    }

    #[cold]
    fn unlock_slow(&self) {
        let callback = |result: parking_lot_core::UnparkResult| {
            if !result.have_more_threads {
                self.state.fetch_and(!PARKED_BIT, Ordering::Relaxed);
            }
            DEFAULT_UNPARK_TOKEN
        };

        // SAFETY: same key as lock_slow; the callback only touches our state
        unsafe {
            unpark_one(self.key(), callback);
        }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex")
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Locker for Mutex {
    #[inline]
    fn lock(&self) {
        Mutex::lock(self)
    }

    #[inline]
    fn unlock(&self) {
        Mutex::unlock(self)
    }
}

/// RAII guard returned by [`Mutex::guard`]
#[must_use = "the mutex is unlocked as soon as the guard is dropped"]
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
}

impl MutexGuard<'_> {
    /// The mutex this guard holds
    pub fn mutex(&self) -> &Mutex {
        self.mutex
    }
}

impl Drop for MutexGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_lock_unlock() {
        let mutex = Mutex::new();
        mutex.lock();
        assert!(mutex.is_locked());
        assert!(!mutex.try_lock());
        mutex.unlock();
        assert!(!mutex.is_locked());
        assert!(mutex.try_lock());
        mutex.unlock();
    }

    #[test]
    fn test_new_locked() {
        let mutex = Mutex::new_locked();
        assert!(!mutex.try_lock());
        mutex.unlock();
        assert!(mutex.try_lock());
        mutex.unlock();
    }

    #[test]
    fn test_checked_unlock_reports_double_unlock() {
        let mutex = Mutex::new();
        assert_eq!(mutex.checked_unlock(), Err(SyncError::UnlockOfUnlocked));

        mutex.lock();
        assert!(mutex.checked_unlock().is_ok());
        assert_eq!(mutex.checked_unlock(), Err(SyncError::UnlockOfUnlocked));
        assert!(!mutex.is_locked());
    }

    #[test]
    #[should_panic(expected = "sync: unlock of unlocked mutex")]
    fn test_unlock_of_unlocked_panics() {
        Mutex::new().unlock();
    }

    #[test]
    fn test_unlock_from_other_thread() {
        let mutex = Arc::new(Mutex::new());
        mutex.lock();

        let remote = mutex.clone();
        thread::spawn(move || remote.unlock()).join().unwrap();

        assert!(mutex.try_lock());
        mutex.unlock();
    }

    #[test]
    fn test_guard_unlocks_on_drop() {
        let mutex = Mutex::new();
        {
            let _guard = mutex.guard();
            assert!(mutex.try_guard().is_none());
        }
        assert!(!mutex.is_locked());
    }

    #[test]
    fn test_contended_wakeup() {
        let mutex = Arc::new(Mutex::with_config(&SyncConfig::long_wait()));
        let acquired = Arc::new(AtomicUsize::new(0));
        mutex.lock();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mutex = mutex.clone();
                let acquired = acquired.clone();
                thread::spawn(move || {
                    mutex.lock();
                    acquired.fetch_add(1, Ordering::SeqCst);
                    mutex.unlock();
                })
            })
            .collect();

        // Give threads time to park
        thread::sleep(Duration::from_millis(50));
        assert_eq!(acquired.load(Ordering::SeqCst), 0);

        mutex.unlock();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(acquired.load(Ordering::SeqCst), 4);
        assert!(!mutex.is_locked());
    }
}
