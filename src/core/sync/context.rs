/*!
 * Primitive Factory
 *
 * `SyncContext` carries one validated [`SyncConfig`] and builds every
 * primitive from it, so a subsystem can tune all of its locks, pools and
 * maps in one place. There is no process-wide instance; callers own and
 * pass their context explicitly.
 */

use super::config::SyncConfig;
use super::locks::{ConcurrentMap, Locker, Mutex, RwMutex};
use super::wait::{Cond, Once, OnceFunc, WaitGroup};
use crate::core::errors::SyncResult;
use crate::core::memory::Pool;
use std::hash::Hash;

/// Factory for configured synchronization primitives
#[derive(Debug, Clone, Default)]
pub struct SyncContext {
    config: SyncConfig,
}

impl SyncContext {
    /// Build a context from an explicit configuration
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        tracing::debug!(
            strategy = ?config.select_strategy(),
            max_spins = config.spin_budget(),
            shards = config.shard_count(),
            "sync context created"
        );
        Ok(Self { config })
    }

    /// Build a context from `AIOS_SYNC_*` environment variables
    pub fn from_env() -> SyncResult<Self> {
        Self::new(SyncConfig::from_env()?)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn new_mutex(&self) -> Mutex {
        Mutex::with_config(&self.config)
    }

    /// A mutex the caller already holds
    pub fn new_locked_mutex(&self) -> Mutex {
        let mutex = self.new_mutex();
        mutex.lock();
        mutex
    }

    pub fn new_rw_mutex(&self) -> RwMutex {
        RwMutex::with_config(&self.config)
    }

    /// An RwMutex with one read lock already held
    pub fn new_read_locked_rw_mutex(&self) -> RwMutex {
        let rw = self.new_rw_mutex();
        rw.rlock();
        rw
    }

    /// An RwMutex with the write lock already held
    pub fn new_write_locked_rw_mutex(&self) -> RwMutex {
        let rw = self.new_rw_mutex();
        rw.lock();
        rw
    }

    pub fn new_cond<L: Locker>(&self, locker: L) -> Cond<L> {
        Cond::new(locker)
    }

    pub fn new_once(&self) -> Once {
        Once::new()
    }

    /// Wrap `f` so it runs at most once
    pub fn once_func<F: FnOnce()>(&self, f: F) -> OnceFunc<F> {
        OnceFunc::new(f)
    }

    /// A wait group whose counter starts at `count`
    pub fn new_wait_group(&self, count: u8) -> WaitGroup {
        WaitGroup::with_count(count)
    }

    /// A pool without a factory
    pub fn new_pool<T>(&self) -> Pool<T> {
        Pool::with_config(&self.config)
    }

    /// A pool that builds objects with `factory` on a miss
    pub fn new_pool_with<T, F>(&self, factory: F) -> Pool<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Pool::with_config(&self.config).factory(factory)
    }

    pub fn new_map<K: Hash + Eq, V>(&self) -> ConcurrentMap<K, V> {
        ConcurrentMap::with_config(&self.config)
    }
}
