/*!
 * Lock Striping Pattern
 *
 * Concurrent hash map partitioned into independently locked shards, each
 * guarded by this crate's [`RwMutex`].
 *
 * # Design
 *
 * - Shard count is a power of two sized by [`ShardManager`]
 * - Shard selection uses the high bits of a map-level ahash, while each
 *   shard's table hashes with its own seed, so keys landing in one shard do
 *   not cluster in that shard's buckets
 * - Every operation on one key runs under one shard lock, which makes the
 *   compound operations (`load_or_store`, `compare_and_swap`, ...) atomic
 * - `range` visits a per-shard snapshot with no lock held, so the visitor
 *   may call back into the map
 */

use super::rwmutex::RwMutex;
use crate::core::sync::config::SyncConfig;
use crate::core::sync::management::ShardManager;
use ahash::RandomState;
use std::borrow::Borrow;
use std::cell::UnsafeCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};

type Table<K, V> = HashMap<K, V, RandomState>;

struct Shard<K, V> {
    lock: RwMutex,
    table: UnsafeCell<Table<K, V>>,
}

// SAFETY: the table is only reached through `read`/`write`, which hold the
// shard lock in the matching mode
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for Shard<K, V> {}

impl<K, V> Shard<K, V> {
    fn new(config: &SyncConfig) -> Self {
        Self {
            lock: RwMutex::with_config(config),
            table: UnsafeCell::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    #[inline]
    fn read<R>(&self, f: impl FnOnce(&Table<K, V>) -> R) -> R {
        let _guard = self.lock.read();
        // SAFETY: shared lock held; writers are excluded
        f(unsafe { &*self.table.get() })
    }

    #[inline]
    fn write<R>(&self, f: impl FnOnce(&mut Table<K, V>) -> R) -> R {
        let _guard = self.lock.write();
        // SAFETY: exclusive lock held
        f(unsafe { &mut *self.table.get() })
    }
}

/// Lock-striped concurrent hash map
///
/// # Example
///
/// ```
/// use ai_os_sync::ConcurrentMap;
///
/// let sessions = ConcurrentMap::new();
/// sessions.store("alice", 1);
///
/// let (value, loaded) = sessions.load_or_store("alice", 2);
/// assert_eq!((value, loaded), (1, true));
/// assert!(sessions.compare_and_swap(&"alice", &1, 3));
/// assert_eq!(sessions.load(&"alice"), Some(3));
/// ```
pub struct ConcurrentMap<K, V> {
    shards: Box<[Shard<K, V>]>,
    hasher: RandomState,
    shift: u32,
}

impl<K: Hash + Eq, V> ConcurrentMap<K, V> {
    /// Map sized for the default workload profile
    pub fn new() -> Self {
        Self::with_config(&SyncConfig::default())
    }

    /// Map with about `shard_count` shards (rounded to a power of two and
    /// clamped)
    pub fn with_shards(shard_count: usize) -> Self {
        Self::build(ShardManager::normalize(shard_count), &SyncConfig::default())
    }

    /// Map whose shard count and shard locks follow `config`
    pub fn with_config(config: &SyncConfig) -> Self {
        Self::build(config.shard_count(), config)
    }

    fn build(shard_count: usize, config: &SyncConfig) -> Self {
        debug_assert!(shard_count.is_power_of_two());
        let shards = (0..shard_count).map(|_| Shard::new(config)).collect();
        tracing::trace!(shard_count, "ConcurrentMap created");
        Self {
            shards,
            hasher: RandomState::new(),
            shift: usize::BITS - shard_count.trailing_zeros(),
        }
    }

    /// Number of shards
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard_index<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        let hash = BuildHasher::hash_one(&self.hasher, key) as usize;
        // High bits pick the shard
        hash >> self.shift
    }

    #[inline]
    fn shard<Q>(&self, key: &Q) -> &Shard<K, V>
    where
        Q: Hash + ?Sized,
    {
        &self.shards[self.shard_index(key)]
    }

    /// Clone of the value stored under `key`
    pub fn load<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.shard(key).read(|table| table.get(key).cloned())
    }

    /// Run `f` on the value under `key` while its shard is read-locked
    ///
    /// `f` must not write to the same map.
    pub fn with_value<Q, R, F>(&self, key: &Q, f: F) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> R,
    {
        self.shard(key).read(|table| table.get(key).map(f))
    }

    /// Whether `key` is present
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).read(|table| table.contains_key(key))
    }

    /// Set the value for `key`
    pub fn store(&self, key: K, value: V) {
        self.shard(&key).write(|table| {
            table.insert(key, value);
        });
    }

    /// Remove `key` if present
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).write(|table| {
            table.remove(key);
        });
    }

    /// Return the existing value (`true`) or store `value` and return it
    /// (`false`)
    pub fn load_or_store(&self, key: K, value: V) -> (V, bool)
    where
        V: Clone,
    {
        let shard = self.shard(&key);

        if let Some(existing) = shard.read(|table| table.get(&key).cloned()) {
            return (existing, true);
        }

        shard.write(|table| match table.entry(key) {
            Entry::Occupied(entry) => (entry.get().clone(), true),
            Entry::Vacant(entry) => (entry.insert(value).clone(), false),
        })
    }

    /// Remove `key` and return its previous value
    pub fn load_and_delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).write(|table| table.remove(key))
    }

    /// Store `value` and return the previous value, if any
    pub fn swap(&self, key: K, value: V) -> Option<V> {
        self.shard(&key).write(|table| table.insert(key, value))
    }

    /// Replace the value under `key` with `new` only if it equals `old`
    ///
    /// An absent key never matches.
    pub fn compare_and_swap<Q>(&self, key: &Q, old: &V, new: V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        let shard = self.shard(key);

        // Cheap rejection under the shared lock
        if !shard.read(|table| table.get(key) == Some(old)) {
            return false;
        }

        shard.write(|table| match table.get_mut(key) {
            Some(current) if *current == *old => {
                *current = new;
                true
            }
            _ => false,
        })
    }

    /// Remove `key` only if its value equals `old`
    pub fn compare_and_delete<Q>(&self, key: &Q, old: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: PartialEq,
    {
        let shard = self.shard(key);

        if !shard.read(|table| table.get(key) == Some(old)) {
            return false;
        }

        shard.write(|table| {
            if table.get(key) == Some(old) {
                table.remove(key);
                true
            } else {
                false
            }
        })
    }

    /// Remove every entry
    ///
    /// All shards are write-locked (in ascending order) before any is
    /// cleared, so no reader observes a partially cleared map.
    pub fn clear(&self) {
        let guards: Vec<_> = self.shards.iter().map(|shard| shard.lock.write()).collect();
        for shard in self.shards.iter() {
            // SAFETY: every shard's exclusive lock is held in `guards`
            unsafe { (*shard.table.get()).clear() };
        }
        drop(guards);
    }

    /// Visit entries until `visitor` returns false
    ///
    /// Each shard is snapshotted under its read lock and visited with no
    /// lock held. Entries present for the whole call are visited exactly
    /// once; concurrent changes may or may not be observed.
    pub fn range<F>(&self, mut visitor: F)
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        for shard in self.shards.iter() {
            let snapshot: Vec<(K, V)> = shard.read(|table| {
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            });

            for (key, value) in &snapshot {
                if !visitor(key, value) {
                    return;
                }
            }
        }
    }

    /// Total entries across shards (not a snapshot under writes)
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.read(|table| table.len()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards
            .iter()
            .all(|shard| shard.read(|table| table.is_empty()))
    }
}

impl<K: Hash + Eq, V> Default for ConcurrentMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, V> fmt::Debug for ConcurrentMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentMap")
            .field("shards", &self.shard_count())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_operations() {
        let map = ConcurrentMap::with_shards(8);

        map.store("key1", 100);
        map.store("key2", 200);

        assert_eq!(map.load(&"key1"), Some(100));
        assert_eq!(map.load(&"key2"), Some(200));
        assert_eq!(map.load(&"key3"), None);
        assert_eq!(map.with_value(&"key1", |v| v * 2), Some(200));

        assert_eq!(map.len(), 2);
        assert!(!map.is_empty());

        map.delete(&"key1");
        assert!(!map.contains_key(&"key1"));
        map.delete(&"key1");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_borrowed_lookup() {
        let map: ConcurrentMap<String, u32> = ConcurrentMap::new();
        map.store("pid-1".to_string(), 1);
        assert_eq!(map.load("pid-1"), Some(1));
        assert!(map.contains_key("pid-1"));
        assert_eq!(map.load_and_delete("pid-1"), Some(1));
        assert_eq!(map.load_and_delete("pid-1"), None);
    }

    #[test]
    fn test_load_or_store() {
        let map = ConcurrentMap::new();
        assert_eq!(map.load_or_store(1, "one"), ("one", false));
        assert_eq!(map.load_or_store(1, "uno"), ("one", true));
        assert_eq!(map.load(&1), Some("one"));
    }

    #[test]
    fn test_swap() {
        let map = ConcurrentMap::new();
        assert_eq!(map.swap(7, 'a'), None);
        assert_eq!(map.swap(7, 'b'), Some('a'));
        assert_eq!(map.load(&7), Some('b'));
    }

    #[test]
    fn test_compare_and_swap() {
        let map = ConcurrentMap::new();
        assert!(!map.compare_and_swap(&"k", &"v1", "v2"));

        map.store("k", "v1");
        assert!(map.compare_and_swap(&"k", &"v1", "v2"));
        assert!(!map.compare_and_swap(&"k", &"v1", "v3"));
        assert_eq!(map.load(&"k"), Some("v2"));
    }

    #[test]
    fn test_compare_and_delete() {
        let map = ConcurrentMap::new();
        map.store(1, 10);
        assert!(!map.compare_and_delete(&1, &11));
        assert!(map.contains_key(&1));
        assert!(map.compare_and_delete(&1, &10));
        assert!(!map.contains_key(&1));
        assert!(!map.compare_and_delete(&1, &10));
    }

    #[test]
    fn test_clear() {
        let map = ConcurrentMap::new();
        for i in 0..100 {
            map.store(i, i);
        }
        map.clear();
        assert!(map.is_empty());
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn test_range_early_stop() {
        let map = ConcurrentMap::new();
        for i in 0..50 {
            map.store(i, i);
        }

        let mut visited = 0;
        map.range(|_, _| {
            visited += 1;
            visited < 10
        });
        assert_eq!(visited, 10);
    }

    #[test]
    fn test_range_may_reenter_map() {
        let map = ConcurrentMap::with_shards(8);
        for i in 0..20 {
            map.store(i, i);
        }

        // Writing back from the visitor must not deadlock
        map.range(|k, v| {
            map.store(*k, v + 100);
            true
        });

        let mut collected = Vec::new();
        map.range(|k, v| {
            collected.push((*k, *v));
            true
        });
        collected.sort();
        let expected: Vec<_> = (0..20).map(|i| (i, i + 100)).collect();
        assert_eq!(collected, expected);
    }

    #[test]
    fn test_concurrent_access() {
        let map = Arc::new(ConcurrentMap::with_shards(16));
        let mut handles = vec![];

        for i in 0..16 {
            let map = map.clone();
            handles.push(thread::spawn(move || {
                for j in 0..1000 {
                    map.store(i * 1000 + j, j);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.len(), 16_000);
    }

    #[test]
    fn test_shard_distribution() {
        let map = ConcurrentMap::with_shards(8);
        assert_eq!(map.shard_count(), 8);

        for i in 0..1000 {
            map.store(i, i);
        }

        // Each shard should hold roughly 1000/8 = 125 keys
        for shard in map.shards.iter() {
            let count = shard.read(|table| table.len());
            assert!(count > 50 && count < 250, "Bad distribution: {}", count);
        }
    }

    #[test]
    fn test_shard_index_uses_full_range() {
        for shards in [8, 64, 512] {
            let map = ConcurrentMap::<u32, ()>::with_shards(shards);
            let mut used = vec![false; shards];
            for key in 0..20_000u32 {
                let index = map.shard_index(&key);
                assert!(index < shards);
                used[index] = true;
            }
            assert!(used.iter().all(|&hit| hit), "idle shard with {} shards", shards);
        }
    }

    #[test]
    fn test_with_shards_normalizes() {
        assert_eq!(ConcurrentMap::<u8, u8>::with_shards(0).shard_count(), 8);
        assert_eq!(ConcurrentMap::<u8, u8>::with_shards(33).shard_count(), 64);
        assert_eq!(ConcurrentMap::<u8, u8>::with_shards(100_000).shard_count(), 512);
    }
}
