/*!
 * Object Pooling for Hot Paths
 * Reduces allocation pressure by caching reusable objects
 *
 * # Design
 *
 * - One bounded lock-free queue per shard; each thread prefers the shard
 *   picked by its thread hint and steals from the others when it is empty
 * - `put` overflows into neighbouring shards and silently drops the object
 *   once every shard is full
 * - Cached objects carry no identity and may be evicted at any time
 */

use crate::core::limits::DEFAULT_POOL_SHARD_CAPACITY;
use crate::core::sync::config::SyncConfig;
use crate::core::sync::management::{ShardManager, WorkloadProfile};
use crossbeam_queue::ArrayQueue;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Source of per-thread shard hints
static NEXT_SHARD_HINT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SHARD_HINT: usize = NEXT_SHARD_HINT.fetch_add(1, Ordering::Relaxed);
}

#[inline]
fn shard_hint() -> usize {
    // Thread-locals are gone during thread teardown
    SHARD_HINT.try_with(|hint| *hint).unwrap_or(0)
}

/// Pool counters snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// `get` calls served from the cache
    pub hits: u64,
    /// `get` calls that found the cache empty
    pub misses: u64,
    /// Objects built by the factory
    pub created: u64,
    /// Objects accepted by `put`
    pub puts: u64,
    /// Objects dropped because every shard was full
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    created: AtomicU64,
    puts: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Sharded cache of reusable objects
///
/// # Example
///
/// ```
/// use ai_os_sync::Pool;
///
/// let buffers = Pool::with_factory(|| Vec::<u8>::with_capacity(4096));
///
/// let mut buf = buffers.get().unwrap_or_default();
/// buf.extend_from_slice(b"payload");
/// buf.clear();
/// buffers.put(buf);
/// ```
pub struct Pool<T> {
    shards: Box<[ArrayQueue<T>]>,
    factory: Option<Factory<T>>,
    counters: Counters,
}

impl<T> Pool<T> {
    /// Pool without a factory: `get` on an empty pool returns `None`
    pub fn new() -> Self {
        Self::build(DEFAULT_POOL_SHARD_CAPACITY, None)
    }

    /// Pool that builds a fresh object with `factory` when empty
    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::build(DEFAULT_POOL_SHARD_CAPACITY, Some(Box::new(factory)))
    }

    /// Pool whose per-shard capacity follows `config`
    pub fn with_config(config: &SyncConfig) -> Self {
        Self::build(config.pool_shard_capacity, None)
    }

    /// Set or replace the factory
    pub fn factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factory = Some(Box::new(factory));
        self
    }

    fn build(shard_capacity: usize, factory: Option<Factory<T>>) -> Self {
        let shard_count = ShardManager::shards(WorkloadProfile::LowContention);
        let shard_capacity = shard_capacity.max(1);
        let shards = (0..shard_count)
            .map(|_| ArrayQueue::new(shard_capacity))
            .collect();

        tracing::trace!(shard_count, shard_capacity, "Pool created");
        Self {
            shards,
            factory,
            counters: Counters::default(),
        }
    }

    #[inline]
    fn home(&self) -> usize {
        shard_hint() & (self.shards.len() - 1)
    }

    /// Take a cached object, or build one with the factory
    ///
    /// Returns `None` only when the pool is empty and has no factory.
    pub fn get(&self) -> Option<T> {
        let mask = self.shards.len() - 1;
        let home = self.home();

        for offset in 0..self.shards.len() {
            if let Some(value) = self.shards[(home + offset) & mask].pop() {
                Counters::bump(&self.counters.hits);
                return Some(value);
            }
        }

        Counters::bump(&self.counters.misses);
        let factory = self.factory.as_ref()?;
        Counters::bump(&self.counters.created);
        Some(factory())
    }

    /// Offer an object for reuse
    ///
    /// The object is dropped when every shard is full.
    pub fn put(&self, value: T) {
        let mask = self.shards.len() - 1;
        let home = self.home();
        let mut value = value;

        for offset in 0..self.shards.len() {
            match self.shards[(home + offset) & mask].push(value) {
                Ok(()) => {
                    Counters::bump(&self.counters.puts);
                    return;
                }
                Err(rejected) => value = rejected,
            }
        }

        Counters::bump(&self.counters.dropped);
        tracing::trace!("Pool full, dropping object");
    }

    /// Drop every cached object, returning how many were evicted
    pub fn evict(&self) -> usize {
        let mut evicted = 0;
        for shard in self.shards.iter() {
            while shard.pop().is_some() {
                evicted += 1;
            }
        }
        tracing::debug!(evicted, "Pool evicted cached objects");
        evicted
    }

    /// Cached objects right now (approximate under concurrency)
    pub fn len(&self) -> usize {
        self.shards.iter().map(ArrayQueue::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(ArrayQueue::is_empty)
    }

    /// Whether `get` can build objects on a miss
    pub fn has_factory(&self) -> bool {
        self.factory.is_some()
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("shards", &self.shards.len())
            .field("cached", &self.len())
            .field("has_factory", &self.has_factory())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_then_get_reuses() {
        let pool = Pool::new();
        pool.put(vec![1u8, 2, 3]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get(), Some(vec![1, 2, 3]));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_empty_without_factory() {
        let pool: Pool<String> = Pool::new();
        assert_eq!(pool.get(), None);
        assert_eq!(pool.stats().misses, 1);
        assert_eq!(pool.stats().created, 0);
    }

    #[test]
    fn test_factory_on_miss() {
        let pool = Pool::with_factory(|| String::from("fresh"));
        assert_eq!(pool.get().as_deref(), Some("fresh"));

        pool.put(String::from("reused"));
        assert_eq!(pool.get().as_deref(), Some("reused"));

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.created, 1);
        assert_eq!(stats.puts, 1);
    }

    #[test]
    fn test_builder_factory() {
        let pool = Pool::with_config(&SyncConfig::default()).factory(|| 5u32);
        assert!(pool.has_factory());
        assert_eq!(pool.get(), Some(5));
    }

    #[test]
    fn test_full_pool_drops() {
        let config = SyncConfig {
            pool_shard_capacity: 1,
            ..SyncConfig::default()
        };
        let pool = Pool::with_config(&config);
        let capacity = pool.shards.len();

        for i in 0..capacity + 3 {
            pool.put(i);
        }
        assert_eq!(pool.len(), capacity);
        assert_eq!(pool.stats().dropped, 3);
    }

    #[test]
    fn test_evict() {
        let pool = Pool::new();
        for i in 0..10 {
            pool.put(i);
        }
        assert_eq!(pool.evict(), 10);
        assert!(pool.is_empty());
        assert_eq!(pool.evict(), 0);
    }

    #[test]
    fn test_steal_across_threads() {
        let pool = Arc::new(Pool::new());
        {
            let pool = pool.clone();
            thread::spawn(move || pool.put(99u64)).join().unwrap();
        }
        // Cached on another thread's shard; found by stealing
        assert_eq!(pool.get(), Some(99));
    }

    #[test]
    fn test_shard_count_ignores_map_profile() {
        let config = |map_profile| SyncConfig {
            map_profile,
            ..SyncConfig::default()
        };
        let low = Pool::<u8>::with_config(&config(WorkloadProfile::LowContention));
        let high = Pool::<u8>::with_config(&config(WorkloadProfile::HighContention));
        assert_eq!(low.shards.len(), high.shards.len());
        assert_eq!(
            high.shards.len(),
            ShardManager::shards(WorkloadProfile::LowContention)
        );
    }

    #[test]
    fn test_stats_serialize() {
        let pool: Pool<u8> = Pool::new();
        pool.put(1);
        let json = serde_json::to_value(pool.stats()).unwrap();
        assert_eq!(json["puts"], 1);
        assert_eq!(json["dropped"], 0);
    }
}
