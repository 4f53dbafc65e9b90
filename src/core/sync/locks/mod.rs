/*!
 * Lock-Based Synchronization Primitives
 *
 * - `Mutex`: exclusive capability lock with spin-then-park contention
 * - `RwMutex`: writer-preferring shared/exclusive lock
 * - `ConcurrentMap`: striped map whose shards are guarded by `RwMutex`
 * - `Locker`: the lock/unlock seam a `Cond` binds to
 */

mod mutex;
mod rwmutex;
mod striped;
mod traits;

// Re-export public API
pub use mutex::{Mutex, MutexGuard};
pub use rwmutex::{RLocker, RwMutex, RwMutexReadGuard, RwMutexWriteGuard};
pub use striped::ConcurrentMap;
pub use traits::Locker;
