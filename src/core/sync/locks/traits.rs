/*!
 * Locker Abstraction
 *
 * Anything with `lock`/`unlock`, usable as the binding target for a `Cond`.
 */

use std::sync::Arc;

/// A lock that can be acquired and released without a guard
///
/// Implementations are capability locks: whoever holds the lock may
/// release it, from any thread.
pub trait Locker: Send + Sync {
    /// Block until the lock is held
    fn lock(&self);

    /// Release the lock
    fn unlock(&self);
}

impl<L: Locker + ?Sized> Locker for &L {
    #[inline]
    fn lock(&self) {
        (**self).lock()
    }

    #[inline]
    fn unlock(&self) {
        (**self).unlock()
    }
}

impl<L: Locker + ?Sized> Locker for Arc<L> {
    #[inline]
    fn lock(&self) {
        (**self).lock()
    }

    #[inline]
    fn unlock(&self) {
        (**self).unlock()
    }
}

impl<L: Locker + ?Sized> Locker for Box<L> {
    #[inline]
    fn lock(&self) {
        (**self).lock()
    }

    #[inline]
    fn unlock(&self) {
        (**self).unlock()
    }
}
