//! Cache Store Module
//!
//! The public cache: routes keys to shards, keeps the recency coordinator in
//! step with the shard indexes, and applies the capacity, time-to-use and
//! cool-off policies.
//!
//! # Consistency
//!
//! Each key maps to at most one live entry, linearized by its shard's lock.
//! Recency updates are applied asynchronously by the coordinator in the order
//! they were submitted, which under contention may differ slightly from the
//! real-time order of the calls that caused them.
//!
//! Capacity is a soft bound. An insertion that takes the indexed count over
//! capacity asks the coordinator to trim the back of the recency list, but
//! promotions still queued by other callers are not visible to that trim, so
//! the cache can briefly hold more entries than its capacity (at most the
//! queue depth). The next insertion over capacity trims again.
//!
//! # Lifecycle
//!
//! A cache is fully initialised by [`Cache::new`] and runs until
//! [`Cache::stop`] is called or it is dropped. After stop, shard operations
//! keep working but recency, eviction, purging and [`Cache::len`] no longer
//! do; callers must not rely on a stopped cache.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::cache::coordinator::Coordinator;
use crate::cache::router::{KeyRouter, RouteKey};
use crate::cache::shard::Shard;
use crate::cache::stats::StatsCounters;
use crate::cache::{CacheStats, Clock, Entry};
use crate::config::CacheConfig;
use crate::error::Result;

// == Cache ==
/// Sharded LRU cache with optional time-to-use expiration.
///
/// # Examples
///
/// ```
/// use ttu_cache::{Cache, CacheConfig};
///
/// let cache = Cache::new(CacheConfig::new().with_capacity(2)).unwrap();
/// cache.add("a".to_string(), 1).unwrap();
/// cache.add("b".to_string(), 2).unwrap();
/// cache.add("c".to_string(), 3).unwrap();
///
/// assert_eq!(cache.len(), 2);
/// assert_eq!(cache.get("a").unwrap(), None);
/// assert_eq!(cache.get("b").unwrap(), Some(2));
/// assert_eq!(cache.get("c").unwrap(), Some(3));
/// ```
pub struct Cache<K, V> {
    config: CacheConfig,
    router: KeyRouter,
    shards: Box<[Shard<K, V>]>,
    coordinator: Coordinator<K, V>,
    /// Entries currently held by the shard indexes, maintained by the shards
    indexed: Arc<AtomicUsize>,
    clock: Clock,
    stats: StatsCounters,
}

impl<K, V> Cache<K, V>
where
    K: RouteKey + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Builds a cache and starts its coordinator.
    ///
    /// Fails with [`CacheError::InvalidConfig`](crate::CacheError::InvalidConfig)
    /// when an option is out of range.
    pub fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;
        let router = KeyRouter::new(config.shards)?;
        let indexed = Arc::new(AtomicUsize::new(0));
        let shards = (0..config.shards)
            .map(|_| Shard::with_counter(Arc::clone(&indexed)))
            .collect();
        let coordinator = Coordinator::spawn(config.queue_depth)?;

        info!(
            capacity = config.capacity,
            ttu_ms = config.ttu.as_millis() as u64,
            shards = config.shards,
            cool_off_ms = config.cool_off.as_millis() as u64,
            "Cache started"
        );

        Ok(Self {
            config,
            router,
            shards,
            coordinator,
            indexed,
            clock: Clock::new(),
            stats: StatsCounters::new(),
        })
    }

    // == Add ==
    /// Inserts or overwrites `key`, resetting its last use.
    ///
    /// Inserting a new key may evict the least recently used entries when
    /// the cache is over capacity.
    pub fn add(&self, key: K, value: V) -> Result<()> {
        let shard = self.shard(&key)?;
        let (entry, previous) = shard.set(key, value, self.clock.now());
        let inserted = previous.is_none();

        if let Some(previous) = previous {
            self.coordinator.evict(previous);
        }
        self.coordinator.promote(entry);

        if inserted
            && self.config.capacity > 0
            && self.indexed.load(Ordering::Acquire) > self.config.capacity
        {
            self.enforce_capacity();
        }
        Ok(())
    }

    // == Get ==
    /// Looks up `key`.
    ///
    /// Returns `Ok(None)` when the key is absent or its time-to-use has run
    /// out; an expired entry is removed on the spot. A hit refreshes the
    /// entry's last use and moves it to the front, unless it was already
    /// used within the cool-off period, in which case both are left as they
    /// were.
    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: RouteKey + Hash + Eq + ?Sized,
    {
        let shard = self.shard(key)?;
        let Some(entry) = shard.get(key) else {
            self.stats.record_miss();
            return Ok(None);
        };

        let now = self.clock.now();
        if entry.is_expired(self.config.ttu, now) {
            if self.remove_entry(shard, &entry) {
                self.stats.record_expirations(1);
            }
            self.stats.record_miss();
            return Ok(None);
        }

        let value = entry.value().clone();
        if !entry.is_cooling(self.config.cool_off, now) {
            entry.touch(now);
            self.coordinator.promote(entry);
        }
        self.stats.record_hit();
        Ok(Some(value))
    }

    /// Checks whether `key` holds a live entry, without promoting it.
    pub fn contains<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: RouteKey + Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        Ok(self
            .shard(key)?
            .get(key)
            .map_or(false, |entry| !entry.is_expired(self.config.ttu, now)))
    }

    // == Remove ==
    /// Removes `key` unconditionally, returning its value if it was present.
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: RouteKey + Hash + Eq + ?Sized,
    {
        let removed = self.shard(key)?.remove(key);
        Ok(removed.map(|entry| {
            let value = entry.value().clone();
            self.coordinator.evict(entry);
            value
        }))
    }

    // == Purge ==
    /// Removes expired entries from the back of the recency list.
    ///
    /// The sweep stops at the first entry that has not expired. Returns the
    /// number of entries removed. Always 0 when time-to-use is disabled.
    pub fn purge(&self) -> usize {
        if self.config.ttu.is_zero() {
            return 0;
        }

        let expired = self.coordinator.expired(self.config.ttu, self.clock.now());
        let removed = expired
            .iter()
            .filter(|entry| self.remove_routed(entry))
            .count();

        if removed > 0 {
            self.stats.record_expirations(removed as u64);
            debug!(removed, "Purged expired entries");
        }
        removed
    }

    // == Sync ==
    /// Waits until the coordinator has applied every recency update this
    /// caller submitted before the call.
    pub fn sync(&self) -> Result<()> {
        self.coordinator.sync()
    }

    fn enforce_capacity(&self) {
        for victim in self.coordinator.overflow(self.config.capacity) {
            if self.remove_routed(&victim) {
                self.stats.record_eviction();
                trace!("Evicted least recently used entry");
            }
        }
    }

    fn shard<Q: RouteKey + ?Sized>(&self, key: &Q) -> Result<&Shard<K, V>> {
        let index = self.router.shard_for(key)?;
        Ok(&self.shards[index])
    }

    /// Removes `entry` from its shard if it still owns its key.
    fn remove_routed(&self, entry: &Arc<Entry<K, V>>) -> bool {
        // The key was routed when it was added, so routing it again succeeds
        match self.shard(entry.key()) {
            Ok(shard) => self.remove_entry(shard, entry),
            Err(_) => false,
        }
    }

    fn remove_entry(&self, shard: &Shard<K, V>, entry: &Arc<Entry<K, V>>) -> bool {
        if !shard.remove_entry(entry) {
            return false;
        }
        self.coordinator.evict(Arc::clone(entry));
        true
    }
}

impl<K, V> Cache<K, V> {
    // == Length ==
    /// Approximate number of live entries.
    ///
    /// Read from the coordinator's counter without waiting for it, so it
    /// trails recent operations; call [`sync`](Cache::sync) first for a
    /// settled value.
    pub fn len(&self) -> usize {
        self.coordinator.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity, 0 = unbounded.
    pub fn cap(&self) -> usize {
        self.config.capacity
    }

    /// Configured time-to-use, zero = never expires.
    pub fn ttu(&self) -> Duration {
        self.config.ttu
    }

    /// Configured cool-off period.
    pub fn cool_off(&self) -> Duration {
        self.config.cool_off
    }

    pub fn shard_count(&self) -> usize {
        self.router.shard_count()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.len())
    }

    // == Stop ==
    /// Stops the coordinator. Calling it again has no effect.
    ///
    /// Dropping the cache stops it as well.
    pub fn stop(&self) {
        if !self.coordinator.is_stopped() {
            info!("Stopping cache");
        }
        self.coordinator.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.coordinator.is_stopped()
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: RouteKey + Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// An unbounded, never-expiring, single-shard cache.
    ///
    /// # Panics
    ///
    /// Panics if the coordinator thread cannot be spawned, like
    /// `std::thread::spawn`.
    fn default() -> Self {
        Self::new(CacheConfig::default()).expect("failed to start cache coordinator")
    }
}

impl<K, V> std::fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("config", &self.config)
            .field("len", &self.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
