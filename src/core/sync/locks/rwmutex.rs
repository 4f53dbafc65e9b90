/*!
 * Reader/Writer Mutex
 *
 * Writer-preferring shared/exclusive lock composed of:
 * - a [`Mutex`] serializing writers against each other
 * - a signed reader counter that an arriving writer biases by
 *   `-MAX_READERS` to announce itself
 * - a departing-reader counter the writer waits on
 * - two parking semaphores (one for blocked readers, one for the writer)
 *
 * # Writer Preference
 *
 * Once a writer has announced itself the reader counter is negative, so
 * every later `rlock` parks on the reader semaphore even though only
 * readers hold the lock. The writer proceeds as soon as the readers that
 * were active at announcement time have left, and its `unlock` releases
 * exactly the readers that queued behind it.
 */

use super::mutex::Mutex;
use super::traits::Locker;
use crate::core::errors::{fault, SyncError, SyncResult};
use crate::core::limits::MAX_READERS;
use crate::core::sync::config::SyncConfig;
use crate::core::sync::wait::Sema;
use std::fmt;
use std::sync::atomic::{AtomicI32, Ordering};

/// Shared/exclusive lock without ownership tracking
pub struct RwMutex {
    /// Held by the active or announcing writer
    writer: Mutex,
    writer_sem: Sema,
    reader_sem: Sema,
    /// Registered readers; negative while a writer is pending or holding
    reader_count: AtomicI32,
    /// Readers the pending writer still waits for
    reader_wait: AtomicI32,
}

impl RwMutex {
    /// Create an unlocked RwMutex
    pub const fn new() -> Self {
        Self::from_writer(Mutex::new())
    }

    /// Create an unlocked RwMutex whose writer mutex follows `config`
    pub fn with_config(config: &SyncConfig) -> Self {
        Self::from_writer(Mutex::with_config(config))
    }

    /// Create an RwMutex already holding one read lock
    pub fn new_read_locked() -> Self {
        let rw = Self::new();
        rw.rlock();
        rw
    }

    /// Create an RwMutex already holding the write lock
    pub fn new_write_locked() -> Self {
        let rw = Self::new();
        rw.lock();
        rw
    }

    const fn from_writer(writer: Mutex) -> Self {
        Self {
            writer,
            writer_sem: Sema::new(),
            reader_sem: Sema::new(),
            reader_count: AtomicI32::new(0),
            reader_wait: AtomicI32::new(0),
        }
    }

    /// Acquire a shared lock, blocking behind any pending writer
    #[inline]
    pub fn rlock(&self) {
        if self.reader_count.fetch_add(1, Ordering::Acquire) + 1 < 0 {
            // A writer is pending; wait for its unlock
            self.reader_sem.acquire();
        }
    }

    /// Acquire a shared lock only if no writer holds or waits
    #[inline]
    pub fn try_rlock(&self) -> bool {
        let mut count = self.reader_count.load(Ordering::Relaxed);
        loop {
            if count < 0 {
                return false;
            }
            match self.reader_count.compare_exchange_weak(
                count,
                count + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => count = actual,
            }
        }
    }

    /// Release a shared lock
    ///
    /// # Panics
    ///
    /// Releasing a read lock that is not held is a usage fault.
    #[inline]
    #[track_caller]
    pub fn runlock(&self) {
        if let Err(err) = self.checked_runlock() {
            fault(err);
        }
    }

    /// Release a shared lock, reporting misuse instead of panicking
    ///
    /// On error the lock state is left untouched.
    #[inline]
    pub fn checked_runlock(&self) -> SyncResult<()> {
        let mut count = self.reader_count.load(Ordering::Relaxed);
        loop {
            // No reader registered, with or without a writer
            if count == 0 || count == -MAX_READERS {
                return Err(SyncError::RUnlockOfUnlocked);
            }
            match self.reader_count.compare_exchange_weak(
                count,
                count - 1,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => count = actual,
            }
        }

        if count - 1 < 0 {
            self.runlock_slow();
        }
        Ok(())
    }

    #[cold]
    fn runlock_slow(&self) {
        // A writer is pending; the last departing reader lets it in
        if self.reader_wait.fetch_sub(1, Ordering::AcqRel) - 1 == 0 {
            self.writer_sem.release(1);
        }
    }

    /// Acquire the exclusive lock
    pub fn lock(&self) {
        // Resolve competition with other writers first
        self.writer.lock();

        // Announce the pending writer to new readers
        let active = self.reader_count.fetch_sub(MAX_READERS, Ordering::AcqRel);

        // Wait for the readers that were already inside
        if active != 0 && self.reader_wait.fetch_add(active, Ordering::AcqRel) + active != 0 {
            self.writer_sem.acquire();
        }
    }

    /// Acquire the exclusive lock only if no reader or writer is active
    pub fn try_lock(&self) -> bool {
        if !self.writer.try_lock() {
            return false;
        }
        if self
            .reader_count
            .compare_exchange(0, -MAX_READERS, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.writer.unlock();
            return false;
        }
        true
    }

    /// Release the exclusive lock
    ///
    /// # Panics
    ///
    /// Releasing a write lock that is not held is a usage fault.
    #[inline]
    #[track_caller]
    pub fn unlock(&self) {
        if let Err(err) = self.checked_unlock() {
            fault(err);
        }
    }

    /// Release the exclusive lock, reporting misuse instead of panicking
    ///
    /// On error the lock state is left untouched.
    pub fn checked_unlock(&self) -> SyncResult<()> {
        let mut count = self.reader_count.load(Ordering::Relaxed);
        loop {
            if count >= 0 {
                return Err(SyncError::UnlockOfUnlockedRw);
            }
            match self.reader_count.compare_exchange_weak(
                count,
                count + MAX_READERS,
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => count = actual,
            }
        }

        // Readers that queued behind us
        let blocked = count + MAX_READERS;

        // blocked >= 0 here, so the cast is lossless
        self.reader_sem.release(blocked as u32);
        self.writer.unlock();
        Ok(())
    }

    /// Shared lock guard
    #[inline]
    pub fn read(&self) -> RwMutexReadGuard<'_> {
        self.rlock();
        RwMutexReadGuard { rw: self }
    }

    /// Exclusive lock guard
    #[inline]
    pub fn write(&self) -> RwMutexWriteGuard<'_> {
        self.lock();
        RwMutexWriteGuard { rw: self }
    }

    /// A [`Locker`] view taking the shared side
    #[inline]
    pub fn rlocker(&self) -> RLocker<'_> {
        RLocker { rw: self }
    }

    /// Readers registered on the lock, holding it or queued behind a writer
    pub fn reader_count(&self) -> usize {
        let count = self.reader_count.load(Ordering::Relaxed);
        let count = if count < 0 { count + MAX_READERS } else { count };
        count.max(0) as usize
    }

    /// Whether a writer holds the lock or has announced itself
    #[inline]
    pub fn has_writer(&self) -> bool {
        self.reader_count.load(Ordering::Relaxed) < 0
    }
}

impl Default for RwMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RwMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwMutex")
            .field("readers", &self.reader_count())
            .field("writer", &self.has_writer())
            .finish()
    }
}

impl Locker for RwMutex {
    #[inline]
    fn lock(&self) {
        RwMutex::lock(self)
    }

    #[inline]
    fn unlock(&self) {
        RwMutex::unlock(self)
    }
}

/// Forwards `lock`/`unlock` to `rlock`/`runlock`
#[derive(Clone, Copy)]
pub struct RLocker<'a> {
    rw: &'a RwMutex,
}

impl Locker for RLocker<'_> {
    #[inline]
    fn lock(&self) {
        self.rw.rlock()
    }

    #[inline]
    fn unlock(&self) {
        self.rw.runlock()
    }
}

impl fmt::Debug for RLocker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RLocker").field(self.rw).finish()
    }
}

/// RAII guard returned by [`RwMutex::read`]
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct RwMutexReadGuard<'a> {
    rw: &'a RwMutex,
}

impl Drop for RwMutexReadGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.rw.runlock();
    }
}

/// RAII guard returned by [`RwMutex::write`]
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct RwMutexWriteGuard<'a> {
    rw: &'a RwMutex,
}

impl Drop for RwMutexWriteGuard<'_> {
    #[inline]
    fn drop(&mut self) {
        self.rw.unlock();
    }
}
