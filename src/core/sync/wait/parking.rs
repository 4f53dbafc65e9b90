/*!
 * Parking Semaphore
 *
 * Counting semaphore on top of `parking_lot_core`'s address-keyed parking
 * lot. This is the wait queue behind RwMutex readers/writers and WaitGroup
 * waiters.
 *
 * # Design
 *
 * - The parking key is the address of the permit counter (stable for as
 *   long as any thread is parked, since parked threads borrow the owner)
 * - `release` before `acquire` is remembered as a permit, so wakeups are
 *   never lost
 * - The validate callback runs under the parking-lot bucket lock, which
 *   serializes it against `unpark_one` from `release`
 */

use parking_lot_core::{park, unpark_one, ParkResult, DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};
use std::sync::atomic::{AtomicU32, Ordering};

/// Counting semaphore with parking
pub(crate) struct Sema {
    permits: AtomicU32,
}

impl Sema {
    pub(crate) const fn new() -> Self {
        Self {
            permits: AtomicU32::new(0),
        }
    }

    #[inline]
    fn key(&self) -> usize {
        &self.permits as *const AtomicU32 as usize
    }

    /// Take a permit without blocking
    #[inline]
    pub(crate) fn try_acquire(&self) -> bool {
        let mut permits = self.permits.load(Ordering::Relaxed);
        while permits > 0 {
            match self.permits.compare_exchange_weak(
                permits,
                permits - 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => permits = actual,
            }
        }
        false
    }

    /// Block until a permit is available, then take it
    pub(crate) fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }

            let validate = || self.permits.load(Ordering::Relaxed) == 0;

            // SAFETY: the key is the address of a field we borrow for the
            // whole call, and no callback panics or touches the parking lot
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

            // Woken or a permit appeared before we slept: retry the fast path
            debug_assert!(!matches!(result, ParkResult::TimedOut));
        }
    }

    /// Add `n` permits and wake up to `n` parked threads
    ///
    /// Returns the number of threads actually unparked.
    pub(crate) fn release(&self, n: u32) -> usize {
        if n == 0 {
            return 0;
        }

        self.permits.fetch_add(n, Ordering::Release);

        let mut woken = 0;
        for _ in 0..n {
            // SAFETY: same key as `acquire`; the callback does nothing
            let result = unsafe { unpark_one(self.key(), |_| DEFAULT_UNPARK_TOKEN) };
            woken += result.unparked_threads;
            if !result.have_more_threads {
                break;
            }
        }
        woken
    }

    /// Permits not yet consumed (diagnostics)
    #[inline]
    pub(crate) fn available(&self) -> u32 {
        self.permits.load(Ordering::Relaxed)
    }
}
