//! Integration Tests for the Cache
//!
//! Exercises the public API from outside the crate, including concurrent use
//! and the periodic purger.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ttu_cache::{spawn_purger, Cache, CacheConfig, CacheError, Encoded};

// == Helper Functions ==

fn bounded_cache(capacity: usize, shards: usize) -> Cache<u64, u64> {
    Cache::new(
        CacheConfig::new()
            .with_capacity(capacity)
            .with_shards(shards),
    )
    .unwrap()
}

fn live_keys(cache: &Cache<u64, u64>, keyspace: u64) -> usize {
    (0..keyspace)
        .filter(|key| cache.contains(key).unwrap())
        .count()
}

// == Basic Behaviour ==

#[test]
fn test_lru_example_across_shards() {
    let cache: Cache<String, i32> = Cache::new(
        CacheConfig::new().with_capacity(2).with_shards(4),
    )
    .unwrap();

    cache.add("a".to_string(), 1).unwrap();
    cache.add("b".to_string(), 2).unwrap();
    cache.add("c".to_string(), 3).unwrap();

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("a").unwrap(), None);
    assert_eq!(cache.get("b").unwrap(), Some(2));
    assert_eq!(cache.get("c").unwrap(), Some(3));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let result: Result<Cache<u64, u64>, _> = Cache::new(CacheConfig::new().with_shards(0));
    assert!(matches!(result, Err(CacheError::InvalidConfig(_))));

    let result: Result<Cache<u64, u64>, _> =
        Cache::new(CacheConfig::new().with_queue_depth(0));
    assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
}

#[test]
fn test_accessors_reflect_config() {
    let cache: Cache<u64, u64> = Cache::new(
        CacheConfig::new()
            .with_capacity(10)
            .with_shards(3)
            .with_ttu(Duration::from_secs(5))
            .with_cool_off(Duration::from_millis(100)),
    )
    .unwrap();

    assert_eq!(cache.cap(), 10);
    assert_eq!(cache.shard_count(), 3);
    assert_eq!(cache.ttu(), Duration::from_secs(5));
    assert_eq!(cache.cool_off(), Duration::from_millis(100));
}

#[test]
fn test_structured_keys_route_through_encoder() {
    #[derive(Clone, PartialEq, Eq, Hash, serde::Serialize)]
    struct UserKey {
        tenant: u32,
        name: String,
    }

    let cache: Cache<Encoded<UserKey>, &'static str> = Cache::new(
        CacheConfig::new().with_shards(8),
    )
    .unwrap();
    let key = Encoded(UserKey {
        tenant: 7,
        name: "ada".to_string(),
    });

    cache.add(key.clone(), "admin").unwrap();
    assert_eq!(cache.get(&key).unwrap(), Some("admin"));
    assert_eq!(cache.remove(&key).unwrap(), Some("admin"));
    assert_eq!(cache.get(&key).unwrap(), None);
}

// == Concurrency ==

#[test]
fn test_concurrent_writers_respect_capacity() {
    let capacity = 100;
    let cache = Arc::new(bounded_cache(capacity, 8));

    let handles: Vec<_> = (0..8u64)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500u64 {
                    cache.add(worker * 1_000 + i, i).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // One more insertion trims whatever the racing writers left over
    cache.add(u64::MAX, 0).unwrap();
    cache.sync().unwrap();

    assert_eq!(cache.len(), capacity);
    assert_eq!(live_keys(&cache, 8_000) + 1, capacity);
    assert!(cache.stats().evictions >= 8 * 500 + 1 - capacity as u64);
}

#[test]
fn test_concurrent_mixed_workload_settles_consistently() {
    let keyspace = 256u64;
    let cache = Arc::new(bounded_cache(0, 16));

    let handles: Vec<_> = (0..6u64)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..2_000u64 {
                    let key = (i * 31 + worker * 17) % keyspace;
                    match (i + worker) % 4 {
                        0 | 1 => {
                            cache.get(&key).unwrap();
                        }
                        2 => cache.add(key, i).unwrap(),
                        _ => {
                            cache.remove(&key).unwrap();
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    cache.sync().unwrap();
    assert_eq!(cache.len(), live_keys(&cache, keyspace));
}

#[test]
fn test_add_remove_churn_on_one_key_settles() {
    let capacity = 4;
    let cache = Arc::new(bounded_cache(capacity, 4));

    let handles: Vec<_> = (0..8u64)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..2_000u64 {
                    if i % 2 == 0 {
                        cache.add(1, i).unwrap();
                    } else {
                        cache.remove(&1).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    cache.sync().unwrap();
    assert!(cache.len() <= 1);
    assert_eq!(cache.len(), live_keys(&cache, 2));
    // Churn on one key never counts as overflow
    assert_eq!(cache.stats().evictions, 0);

    // Capacity is still enforced exactly afterwards
    for key in 100..100 + capacity as u64 + 1 {
        cache.add(key, key).unwrap();
    }
    assert_eq!(cache.len(), capacity);
    assert_eq!(live_keys(&cache, 200), capacity);
}

#[test]
fn test_tiny_queues_apply_backpressure() {
    let capacity = 16;
    let cache: Arc<Cache<u64, u64>> = Arc::new(
        Cache::new(
            CacheConfig::new()
                .with_capacity(capacity)
                .with_shards(4)
                .with_queue_depth(1),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..8u64)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..2_000u64 {
                    let key = worker * 10_000 + i;
                    cache.add(key, i).unwrap();
                    cache.get(&(worker * 10_000 + i / 2)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // A single writer trims whatever the racing writers left over
    let last = 1_000_000u64;
    for key in last..=last + capacity as u64 {
        cache.add(key, key).unwrap();
    }
    cache.sync().unwrap();

    assert_eq!(cache.len(), capacity);
    for key in last + 1..=last + capacity as u64 {
        assert_eq!(cache.get(&key).unwrap(), Some(key));
    }
}

#[test]
fn test_concurrent_readers_see_written_values() {
    let cache: Arc<Cache<String, String>> = Arc::new(Cache::new(
        CacheConfig::new().with_shards(4),
    )
    .unwrap());
    for i in 0..50 {
        cache.add(format!("key_{}", i), format!("value_{}", i)).unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..50 {
                    let value = cache.get(&format!("key_{}", i)).unwrap();
                    assert_eq!(value, Some(format!("value_{}", i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.stats().hits, 200);
}

// == Expiration ==

#[test]
fn test_purger_sweeps_expired_entries() {
    let cache: Arc<Cache<u64, u64>> = Arc::new(
        Cache::new(CacheConfig::new().with_ttu(Duration::from_millis(40))).unwrap(),
    );
    for key in 0..10 {
        cache.add(key, key).unwrap();
    }

    tokio_test::block_on(async {
        let purger = spawn_purger(Arc::clone(&cache), Duration::from_millis(15));
        tokio::time::sleep(Duration::from_millis(250)).await;
        purger.shutdown().await;
    });

    assert!(cache.is_empty());
    assert_eq!(cache.stats().expirations, 10);
    assert_eq!(live_keys(&cache, 10), 0);
}

#[test]
fn test_manual_purge_stops_at_live_entry() {
    let cache: Cache<u64, u64> =
        Cache::new(CacheConfig::new().with_ttu(Duration::from_millis(60))).unwrap();

    cache.add(1, 1).unwrap();
    cache.add(2, 2).unwrap();
    thread::sleep(Duration::from_millis(150));
    cache.add(3, 3).unwrap();

    assert_eq!(cache.purge(), 2);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&3).unwrap(), Some(3));
}

// == Lifecycle ==

#[test]
fn test_stop_then_drop() {
    let cache = bounded_cache(10, 2);
    cache.add(1, 1).unwrap();

    cache.stop();
    assert!(cache.is_stopped());
    assert!(matches!(cache.sync(), Err(CacheError::Stopped)));
    assert_eq!(cache.purge(), 0);

    // Dropping an already stopped cache must not block
    drop(cache);
}

#[test]
fn test_drop_without_stop() {
    let cache = bounded_cache(10, 2);
    for key in 0..20 {
        cache.add(key, key).unwrap();
    }
    drop(cache);
}
