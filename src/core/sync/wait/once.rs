/*!
 * One-Shot Execution
 *
 * `Once` runs a function at most once per instance. The fast path is a
 * single acquire load of the done flag; the slow path serializes callers
 * on this crate's [`Mutex`] so late arrivals block until the winner's
 * function has returned (or unwound).
 *
 * Calling `call_once` on the same instance from inside its own function
 * deadlocks.
 */

use crate::core::sync::locks::Mutex;
use std::any::Any;
use std::cell::UnsafeCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// Marks the gate done when dropped, including during unwinding
struct Complete<'a> {
    done: &'a AtomicBool,
}

impl Drop for Complete<'_> {
    #[inline]
    fn drop(&mut self) {
        self.done.store(true, Ordering::Release);
    }
}

/// Exactly-once execution gate
pub struct Once {
    done: AtomicBool,
    m: Mutex,
}

impl Once {
    pub const fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            m: Mutex::new(),
        }
    }

    /// Run `f` if no call on this instance has run yet
    ///
    /// Every caller returns only after the winning `f` finished. If `f`
    /// panics the gate still counts as done: the panic reaches the caller
    /// that ran it and later calls return without doing anything.
    #[inline]
    pub fn call_once<F: FnOnce()>(&self, f: F) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        self.call_slow(f);
    }

    #[cold]
    fn call_slow<F: FnOnce()>(&self, f: F) {
        let _guard = self.m.guard();
        if !self.done.load(Ordering::Relaxed) {
            // Dropped before _guard, so done is published before unlock
            let _complete = Complete { done: &self.done };
            f();
        }
    }

    /// Whether the gate has fired
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl Default for Once {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Once {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Once").field("done", &self.is_done()).finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// A function wrapped so it runs at most once
///
/// If the function panicked, every later [`OnceFunc::call`] panics with the
/// same message.
pub struct OnceFunc<F> {
    once: Once,
    f: UnsafeCell<Option<F>>,
    panicked: UnsafeCell<Option<String>>,
}

// SAFETY: both cells are written only inside the Once gate, and read only
// after the gate reports done (acquire on the done flag or the gate mutex)
unsafe impl<F: Send> Sync for OnceFunc<F> {}

impl<F: FnOnce()> OnceFunc<F> {
    pub fn new(f: F) -> Self {
        Self {
            once: Once::new(),
            f: UnsafeCell::new(Some(f)),
            panicked: UnsafeCell::new(None),
        }
    }

    /// Run the wrapped function on the first call; later calls are no-ops
    /// unless it panicked
    #[track_caller]
    pub fn call(&self) {
        self.once.call_once(|| {
            // SAFETY: we are the single run of the gate
            let f = unsafe { (*self.f.get()).take() };
            if let Some(f) = f {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
                    // SAFETY: as above
                    unsafe { *self.panicked.get() = Some(panic_message(payload.as_ref())) };
                    panic::resume_unwind(payload);
                }
            }
        });

        // SAFETY: the gate is done, so the cell is no longer written
        if let Some(msg) = unsafe { (*self.panicked.get()).as_deref() } {
            panic!("{msg}");
        }
    }

    /// Whether the wrapped function has run
    pub fn is_done(&self) -> bool {
        self.once.is_done()
    }
}

impl<F> fmt::Debug for OnceFunc<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceFunc")
            .field("done", &self.once.is_done())
            .finish()
    }
}

/// A value computed at most once and then shared by reference
pub struct OnceValue<T> {
    once: Once,
    value: UnsafeCell<Option<T>>,
}

// SAFETY: the value is written once inside the gate and only shared as &T
// after the gate is done
unsafe impl<T: Send + Sync> Sync for OnceValue<T> {}

impl<T> OnceValue<T> {
    pub const fn new() -> Self {
        Self {
            once: Once::new(),
            value: UnsafeCell::new(None),
        }
    }

    /// Return the value, running `init` if nobody has yet
    ///
    /// # Panics
    ///
    /// Panics if `init` panics, and on every later call once that happened.
    pub fn get_or_init<F: FnOnce() -> T>(&self, init: F) -> &T {
        self.once.call_once(|| {
            let value = init();
            // SAFETY: single run of the gate; no reference is handed out yet
            unsafe { *self.value.get() = Some(value) };
        });
        match self.get() {
            Some(value) => value,
            None => panic!("sync: OnceValue initializer panicked"),
        }
    }

    /// The value if it has been initialized
    pub fn get(&self) -> Option<&T> {
        if !self.once.is_done() {
            return None;
        }
        // SAFETY: the gate is done, so the cell is never written again
        unsafe { (*self.value.get()).as_ref() }
    }

    /// Take the value out, leaving nothing behind
    pub fn into_inner(self) -> Option<T> {
        self.value.into_inner()
    }
}

impl<T> Default for OnceValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for OnceValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OnceValue").field(&self.get()).finish()
    }
}
