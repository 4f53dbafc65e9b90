/*!
 * WaitGroup
 *
 * Counter barrier packed into one 64-bit state word:
 *
 * ```text
 * | counter (i32, high 32 bits) | waiters (u32, low 32 bits) |
 * ```
 *
 * The add that brings the counter to zero swaps the entire word to zero and
 * hands one semaphore permit to each registered waiter, so zeroing and
 * releasing are a single transition and a concurrent `wait` either
 * registers before it (and is released) or observes zero (and returns).
 */

use super::parking::Sema;
use crate::core::errors::{fault, SyncError, SyncResult};
use crate::core::limits::WAITGROUP_COUNTER_SHIFT;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[inline]
fn counter_of(state: u64) -> i32 {
    (state >> WAITGROUP_COUNTER_SHIFT) as u32 as i32
}

#[inline]
fn waiters_of(state: u64) -> u32 {
    state as u32
}

#[inline]
fn pack(counter: i32, waiters: u32) -> u64 {
    ((counter as u32 as u64) << WAITGROUP_COUNTER_SHIFT) | waiters as u64
}

/// Wait for a collection of tasks to finish
pub struct WaitGroup {
    state: AtomicU64,
    sema: Sema,
}

impl WaitGroup {
    pub const fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
            sema: Sema::new(),
        }
    }

    /// A group whose counter starts at `count`
    pub const fn with_count(count: u8) -> Self {
        Self {
            state: AtomicU64::new((count as u64) << WAITGROUP_COUNTER_SHIFT),
            sema: Sema::new(),
        }
    }

    /// Adjust the counter by `delta`
    ///
    /// # Panics
    ///
    /// Driving the counter negative is a usage fault.
    #[inline]
    #[track_caller]
    pub fn add(&self, delta: i32) {
        if let Err(err) = self.checked_add(delta) {
            fault(err);
        }
    }

    /// Decrement the counter by one
    #[inline]
    #[track_caller]
    pub fn done(&self) {
        self.add(-1);
    }

    /// Adjust the counter, reporting a negative result instead of panicking
    ///
    /// On error the state is left untouched.
    pub fn checked_add(&self, delta: i32) -> SyncResult<()> {
        let mut state = self.state.load(Ordering::Relaxed);
        loop {
            let counter = counter_of(state);
            let waiters = waiters_of(state);
            let next = match counter.checked_add(delta) {
                Some(next) if next >= 0 => next,
                Some(_) => return Err(SyncError::NegativeCounter),
                None if delta > 0 => return Err(SyncError::CounterOverflow),
                None => return Err(SyncError::NegativeCounter),
            };

            // Reaching zero clears the waiter count in the same step
            let new_state = if next == 0 { 0 } else { pack(next, waiters) };

            match self.state.compare_exchange_weak(
                state,
                new_state,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    if next == 0 && waiters > 0 {
                        let woken = self.sema.release(waiters);
                        tracing::trace!(waiters, woken, "WaitGroup released waiters");
                    }
                    return Ok(());
                }
                Err(actual) => state = actual,
            }
        }
    }

    /// Block until the counter is zero
    ///
    /// # Panics
    ///
    /// Faults if the group was reused (counter raised again) before this
    /// waiter returned.
    #[track_caller]
    pub fn wait(&self) {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if counter_of(state) == 0 {
                return;
            }
            match self.state.compare_exchange_weak(
                state,
                state + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => state = actual,
            }
        }

        self.sema.acquire();
        if self.state.load(Ordering::Acquire) != 0 {
            fault(SyncError::WaitGroupMisuse);
        }
    }

    /// Current counter value (diagnostics)
    #[inline]
    pub fn counter(&self) -> i32 {
        counter_of(self.state.load(Ordering::Relaxed))
    }

    /// Threads currently blocked in `wait` (diagnostics)
    #[inline]
    pub fn waiters(&self) -> u32 {
        waiters_of(self.state.load(Ordering::Relaxed))
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WaitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitGroup")
            .field("counter", &self.counter())
            .field("waiters", &self.waiters())
            .finish()
    }
}
