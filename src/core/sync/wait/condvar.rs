/*!
 * Condition Variable
 *
 * Condition variable bound to an external [`Locker`], implemented as a
 * ticketed notify list on the parking lot.
 *
 * # Design: Tickets Instead of a Sequence Word
 *
 * A plain sequence counter cannot tell a waiter that has taken its snapshot
 * but not yet parked apart from one that is already asleep, so a single
 * signal may release two of them. Here every waiter draws a ticket (while
 * still holding the locker) and parks with that ticket as its park token:
 *
 * - `signal` advances the notify counter by one and unparks exactly the
 *   thread holding the ticket it just covered
 * - `broadcast` advances the notify counter to the wait counter and unparks
 *   every covered ticket
 * - a waiter whose ticket is covered before it manages to park sees that in
 *   the validate callback and returns without sleeping
 * - a `wait` whose unlock faults retires its ticket, so no later signal is
 *   spent on a thread that never parked
 *
 * The validate callback and `unpark_filter` both run under the parking-lot
 * bucket lock, which rules out lost wakeups.
 */

use super::traits::WakeResult;
use crate::core::sync::locks::Locker;
use parking_lot_core::{park, unpark_filter, FilterOp, ParkToken, DEFAULT_UNPARK_TOKEN};
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Empty abandoned-ticket slot
const NO_TICKET: usize = usize::MAX;

/// `a` was issued before `b` (wrapping ticket arithmetic)
#[inline]
fn ticket_before(a: usize, b: usize) -> bool {
    (a.wrapping_sub(b) as isize) < 0
}

/// Condition variable bound to one locker for its whole life
pub struct Cond<L: Locker> {
    locker: L,
    /// Next ticket to hand to a waiter
    wait: AtomicUsize,
    /// First ticket not yet notified
    notify: AtomicUsize,
    /// Ticket of a waiter whose unlock faulted while older tickets were
    /// still queued; the signal that reaches it passes the wakeup on
    abandoned: AtomicUsize,
}

/// Retires the ticket of a `wait` that unwinds out of the unlock
struct TicketGuard<'a, L: Locker> {
    cond: &'a Cond<L>,
    ticket: usize,
}

impl<L: Locker> Drop for TicketGuard<'_, L> {
    fn drop(&mut self) {
        self.cond.abandon(self.ticket);
    }
}

impl<L: Locker> Cond<L> {
    /// Bind a condition variable to `locker`
    pub fn new(locker: L) -> Self {
        Self {
            locker,
            wait: AtomicUsize::new(0),
            notify: AtomicUsize::new(0),
            abandoned: AtomicUsize::new(NO_TICKET),
        }
    }

    /// The bound locker
    #[inline]
    pub fn locker(&self) -> &L {
        &self.locker
    }

    #[inline]
    fn key(&self) -> usize {
        &self.notify as *const AtomicUsize as usize
    }

    #[inline]
    fn is_notified(&self, ticket: usize) -> bool {
        ticket_before(ticket, self.notify.load(Ordering::SeqCst))
    }

    /// Release the locker, sleep until notified, reacquire the locker
    ///
    /// The caller must hold the locker. Callers re-check their predicate
    /// in a loop after `wait` returns.
    ///
    /// # Panics
    ///
    /// Propagates the locker's unlock fault when the locker is not held;
    /// the condition variable stays usable for other waiters.
    pub fn wait(&self) {
        let ticket = self.wait.fetch_add(1, Ordering::SeqCst);
        let guard = TicketGuard { cond: self, ticket };
        self.locker.unlock();
        mem::forget(guard);

        self.park_until_notified(ticket);
        self.locker.lock();
    }

    /// Wait while `condition` keeps returning true
    ///
    /// The condition is evaluated with the locker held, before the first
    /// wait and after every wakeup.
    pub fn wait_while<F>(&self, mut condition: F)
    where
        F: FnMut() -> bool,
    {
        while condition() {
            self.wait();
        }
    }

    fn park_until_notified(&self, ticket: usize) {
        while !self.is_notified(ticket) {
            let validate = || !self.is_notified(ticket);

            // SAFETY: the key is the address of our notify counter, which
            // lives as long as the &self borrow; callbacks do not park
            unsafe {
                park(
                    self.key(),
                    validate,
                    || {},
                    |_, _| {},
                    ParkToken(ticket),
                    None,
                );
            }
        }
    }

    /// Retire a ticket whose owner will never park
    #[cold]
    fn abandon(&self, ticket: usize) {
        let mut notify = self.notify.load(Ordering::SeqCst);
        loop {
            if ticket_before(ticket, notify) {
                // A signal already spent its wakeup on this ticket
                self.signal();
                return;
            }
            if notify != ticket {
                break;
            }
            // Oldest outstanding ticket: cover it without waking anyone
            match self.notify.compare_exchange(
                notify,
                notify.wrapping_add(1),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return,
                Err(actual) => notify = actual,
            }
        }

        // Older tickets are queued ahead of this one
        if ticket == NO_TICKET
            || self
                .abandoned
                .compare_exchange(NO_TICKET, ticket, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
        {
            // Slot taken: settle for an early wakeup of the oldest waiter
            self.signal();
            return;
        }

        // A signal may have covered the ticket before seeing the slot
        if self.is_notified(ticket) && self.claim_abandoned(ticket) {
            self.signal();
        }
    }

    /// Take the abandoned slot if it holds `ticket`
    #[inline]
    fn claim_abandoned(&self, ticket: usize) -> bool {
        ticket != NO_TICKET
            && self
                .abandoned
                .compare_exchange(ticket, NO_TICKET, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
    }

    /// Cover the oldest outstanding ticket, if any
    fn advance_one(&self) -> Option<usize> {
        let mut notify = self.notify.load(Ordering::SeqCst);
        loop {
            if notify == self.wait.load(Ordering::SeqCst) {
                return None;
            }
            match self.notify.compare_exchange_weak(
                notify,
                notify.wrapping_add(1),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some(notify),
                Err(actual) => notify = actual,
            }
        }
    }

    /// Wake at most one waiter
    ///
    /// Never blocks; a no-op when nobody waits.
    pub fn signal(&self) -> WakeResult {
        let target = loop {
            match self.advance_one() {
                None => return WakeResult::NoWaiters,
                Some(ticket) if self.claim_abandoned(ticket) => continue,
                Some(ticket) => break ticket,
            }
        };

        // SAFETY: same key as park_until_notified; the callbacks do not
        // touch the parking lot
        unsafe {
            unpark_filter(
                self.key(),
                |ParkToken(ticket)| {
                    if ticket == target {
                        FilterOp::Unpark
                    } else {
                        FilterOp::Skip
                    }
                },
                |_| DEFAULT_UNPARK_TOKEN,
            );
        }

        WakeResult::Woken(1)
    }

    /// Wake every current waiter
    ///
    /// Never blocks; a no-op when nobody waits.
    pub fn broadcast(&self) -> WakeResult {
        let mut notify = self.notify.load(Ordering::SeqCst);
        let wait = loop {
            let wait = self.wait.load(Ordering::SeqCst);
            if notify == wait {
                return WakeResult::NoWaiters;
            }
            match self.notify.compare_exchange_weak(
                notify,
                wait,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break wait,
                Err(actual) => notify = actual,
            }
        };

        // SAFETY: as in signal
        unsafe {
            unpark_filter(
                self.key(),
                |ParkToken(ticket)| {
                    if ticket_before(ticket, wait) {
                        FilterOp::Unpark
                    } else {
                        FilterOp::Skip
                    }
                },
                |_| DEFAULT_UNPARK_TOKEN,
            );
        }

        let mut woken = wait.wrapping_sub(notify);
        let abandoned = self.abandoned.load(Ordering::SeqCst);
        if abandoned != NO_TICKET
            && !ticket_before(abandoned, notify)
            && ticket_before(abandoned, wait)
            && self.claim_abandoned(abandoned)
        {
            woken -= 1;
        }
        WakeResult::from_count(woken)
    }

    /// Waiters that have not been notified yet (diagnostics)
    #[inline]
    pub fn waiter_count(&self) -> usize {
        let pending = self
            .wait
            .load(Ordering::SeqCst)
            .wrapping_sub(self.notify.load(Ordering::SeqCst));
        let abandoned = (self.abandoned.load(Ordering::SeqCst) != NO_TICKET) as usize;
        pending.saturating_sub(abandoned)
    }
}

impl<L: Locker + fmt::Debug> fmt::Debug for Cond<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cond")
            .field("locker", &self.locker)
            .field("waiters", &self.waiter_count())
            .finish()
    }
}
