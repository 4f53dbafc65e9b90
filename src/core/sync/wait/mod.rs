/*!
 * Wait/Notify Primitives
 *
 * Blocking coordination built on the address-keyed parking lot:
 * - `Cond`: condition variable bound to any [`Locker`](super::locks::Locker)
 * - `Once`, `OnceFunc`, `OnceValue`: exactly-once execution
 * - `WaitGroup`: counter barrier
 *
 * # Architecture
 *
 * Every primitive keeps its state in atomics and parks only when it must.
 * `Sema` is the shared wait queue: a counting semaphore whose permits make
 * early wakeups stick, so a release racing ahead of a park is never lost.
 * `SpinWait` bounds the spinning the locks do before they park.
 */

mod condvar;
mod once;
mod parking;
mod spinwait;
mod traits;
mod waitgroup;

pub use condvar::Cond;
pub use once::{Once, OnceFunc, OnceValue};
pub use spinwait::{SpinPolicy, SpinWait};
pub use traits::WakeResult;
pub use waitgroup::WaitGroup;

pub(crate) use parking::Sema;
