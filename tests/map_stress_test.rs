/*!
 * ConcurrentMap Stress Tests
 * Concurrent stress tests for the striped map's atomic operations
 */

use ai_os_sync::{ConcurrentMap, SyncConfig, WorkloadProfile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

// Test constants for stress testing
const WORKERS: usize = 8;
const KEYS_PER_WORKER: usize = 2_000;
const INCREMENTS: usize = 1_000;

#[test]
fn test_round_trip_and_delete() {
    let map = ConcurrentMap::new();
    map.store("k", 1);
    assert_eq!(map.load(&"k"), Some(1));

    map.delete(&"k");
    assert_eq!(map.load(&"k"), None);
}

#[test]
fn test_stale_compare_and_swap_fails() {
    let map = ConcurrentMap::new();
    map.store("k", "v1");
    assert!(map.compare_and_swap(&"k", &"v1", "v2"));
    assert!(!map.compare_and_swap(&"k", &"v1", "v3"));
    assert_eq!(map.load(&"k"), Some("v2"));
}

#[test]
fn test_concurrent_store_load_delete() {
    let map = Arc::new(ConcurrentMap::with_config(&SyncConfig {
        map_profile: WorkloadProfile::HighContention,
        ..SyncConfig::default()
    }));

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                let base = worker * KEYS_PER_WORKER;
                for key in base..base + KEYS_PER_WORKER {
                    map.store(key, key * 2);
                }
                for key in base..base + KEYS_PER_WORKER {
                    assert_eq!(map.load(&key), Some(key * 2));
                }
                // Drop the odd half of our range
                for key in (base..base + KEYS_PER_WORKER).filter(|k| k % 2 == 1) {
                    map.delete(&key);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(map.len(), WORKERS * KEYS_PER_WORKER / 2);
    assert!(map.load(&1).is_none());
    assert_eq!(map.load(&2), Some(4));
}

#[test]
fn test_load_or_store_single_winner() {
    let map = Arc::new(ConcurrentMap::new());
    let barrier = Arc::new(Barrier::new(WORKERS));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let map = Arc::clone(&map);
            let barrier = Arc::clone(&barrier);
            let winners = Arc::clone(&winners);
            thread::spawn(move || {
                barrier.wait();
                let (value, loaded) = map.load_or_store("leader", worker);
                if !loaded {
                    winners.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(value, worker);
                }
                value
            })
        })
        .collect();

    let observed: HashSet<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    // Every caller saw the same stored value
    assert_eq!(observed.len(), 1);
    assert_eq!(map.load(&"leader"), observed.into_iter().next());
}

#[test]
fn test_compare_and_swap_counter() {
    let map = Arc::new(ConcurrentMap::new());
    map.store("counter", 0usize);

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                let mut retries = 0usize;
                for _ in 0..INCREMENTS {
                    loop {
                        let current = map.load(&"counter").unwrap();
                        if map.compare_and_swap(&"counter", &current, current + 1) {
                            break;
                        }
                        retries += 1;
                    }
                }
                retries
            })
        })
        .collect();

    let retries: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    println!("CAS counter: {} retries", retries);
    assert_eq!(map.load(&"counter"), Some(WORKERS * INCREMENTS));
}

#[test]
fn test_swap_and_load_and_delete_hand_off() {
    let map = Arc::new(ConcurrentMap::new());
    let taken = Arc::new(AtomicUsize::new(0));

    // Producers swap values in, consumers take them out; nothing is lost
    let producers: Vec<_> = (0..WORKERS / 2)
        .map(|worker| {
            let map = Arc::clone(&map);
            thread::spawn(move || {
                let mut displaced = 0usize;
                for i in 0..INCREMENTS {
                    if map.swap(i % 16, worker).is_some() {
                        displaced += 1;
                    }
                }
                displaced
            })
        })
        .collect();

    let consumers: Vec<_> = (0..WORKERS / 2)
        .map(|_| {
            let map = Arc::clone(&map);
            let taken = Arc::clone(&taken);
            thread::spawn(move || {
                for i in 0..INCREMENTS {
                    if map.load_and_delete(&(i % 16)).is_some() {
                        taken.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();

    let displaced: usize = producers.into_iter().map(|h| h.join().unwrap()).sum();
    for handle in consumers {
        handle.join().unwrap();
    }

    let stored = (WORKERS / 2) * INCREMENTS;
    assert_eq!(displaced + taken.load(Ordering::SeqCst) + map.len(), stored);
}

#[test]
fn test_range_sees_stable_entries_under_churn() {
    const STABLE: usize = 500;

    let map = Arc::new(ConcurrentMap::with_shards(16));
    for key in 0..STABLE {
        map.store(key, key);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let churners: Vec<_> = (0..4u64)
        .map(|seed| {
            let map = Arc::clone(&map);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                while !stop.load(Ordering::Relaxed) {
                    // Churn only keys outside the stable range
                    let key = STABLE + rng.gen_range(0..1_000);
                    if rng.gen_bool(0.5) {
                        map.store(key, key);
                    } else {
                        map.delete(&key);
                    }
                }
            })
        })
        .collect();

    for _ in 0..20 {
        let mut seen = vec![0u32; STABLE];
        map.range(|key, value| {
            assert!(key == value);
            if *key < STABLE {
                seen[*key] += 1;
            }
            true
        });
        assert!(seen.iter().all(|&count| count == 1), "stable entry missed or repeated");
    }

    stop.store(true, Ordering::Relaxed);
    for handle in churners {
        handle.join().unwrap();
    }
}

#[test]
fn test_clear_is_all_or_nothing() {
    let map = Arc::new(ConcurrentMap::with_shards(8));
    for key in 0..1_000 {
        map.store(key, ());
    }

    let reader = {
        let map = Arc::clone(&map);
        thread::spawn(move || {
            // Once key 0 is gone, key 999 must be gone as well
            for _ in 0..2_000 {
                let first = map.contains_key(&0);
                let last = map.contains_key(&999);
                assert!(first || !last, "observed a partially cleared map");
            }
        })
    };

    map.clear();
    reader.join().unwrap();
    assert!(map.is_empty());
}
