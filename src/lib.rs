/*!
 * AI-OS Sync Library
 * Thread synchronization primitives built on atomics and a parking lot
 *
 * - `Mutex` / `RwMutex`: capability locks without ownership tracking
 * - `Cond`: condition variable over any `Locker`
 * - `Once`, `OnceFunc`, `OnceValue`: exactly-once execution
 * - `WaitGroup`: counter barrier
 * - `Pool`: sharded object cache
 * - `ConcurrentMap`: striped concurrent hash map
 */

pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{fault, SyncError, SyncResult};
pub use crate::core::memory::{Pool, PoolStats};
pub use crate::core::sync::{
    ConcurrentMap, Cond, Locker, Mutex, MutexGuard, Once, OnceFunc, OnceValue, RLocker, RwMutex,
    RwMutexReadGuard, RwMutexWriteGuard, ShardManager, StrategyType, SyncConfig, SyncContext,
    WaitGroup, WakeResult, WorkloadProfile,
};
pub use monitoring::init_tracing;
