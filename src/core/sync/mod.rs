/*!
 * Synchronization Primitives
 *
 * Blocking and shared-state primitives built from atomics and an
 * address-keyed parking lot:
 * - Locks: `Mutex`, `RwMutex`, and the striped `ConcurrentMap`
 * - Wait/notify: `Cond`, `Once`, `WaitGroup`
 * - Factory: `SyncContext` builds all of them from one `SyncConfig`
 *
 * # Architecture
 *
 * Fast paths are a single atomic read-modify-write. Contended paths spin
 * with a bounded budget (`SpinWait`) and then park on the primitive's own
 * address, so an idle primitive costs nothing but its state word.
 *
 * # Use Cases
 *
 * - **Shared tables**: `ConcurrentMap` for per-key state with many writers
 * - **Lazy setup**: `Once`/`OnceValue` for one-time initialization
 * - **Fan-out/fan-in**: `WaitGroup` to join many workers
 */

pub(crate) mod config;
mod context;
pub(crate) mod locks;
pub(crate) mod management;
pub(crate) mod wait;

pub use config::{StrategyType, SyncConfig};
pub use context::SyncContext;
pub use locks::{
    ConcurrentMap, Locker, Mutex, MutexGuard, RLocker, RwMutex, RwMutexReadGuard,
    RwMutexWriteGuard,
};
pub use management::{ShardManager, WorkloadProfile};
pub use wait::{Cond, Once, OnceFunc, OnceValue, SpinPolicy, SpinWait, WaitGroup, WakeResult};
