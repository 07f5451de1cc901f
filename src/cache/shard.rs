//! Shard Store Module
//!
//! One partition of the keyspace: a key-to-entry index behind its own lock.
//! A shard holds no ordering information and never touches the ordering
//! list, so its critical sections are short and bounded.
//!
//! Every shard of a cache shares one indexed-entry counter. It is only
//! changed while the shard lock is held, by the same critical section that
//! inserts or removes the key, so it never runs ahead of or behind the
//! indexes it counts.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::Entry;

// == Shard ==
/// Mapping from key to entry, guarded by a shard-local mutex.
#[derive(Debug)]
pub struct Shard<K, V> {
    index: Mutex<HashMap<K, Arc<Entry<K, V>>>>,
    /// Entries indexed across all shards sharing this counter
    indexed: Arc<AtomicUsize>,
}

impl<K, V> Shard<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates an empty shard with a counter of its own.
    pub fn new() -> Self {
        Self::with_counter(Arc::new(AtomicUsize::new(0)))
    }

    /// Creates an empty shard that counts its entries into `indexed`.
    pub fn with_counter(indexed: Arc<AtomicUsize>) -> Self {
        Self {
            index: Mutex::new(HashMap::new()),
            indexed,
        }
    }

    // == Set ==
    /// Installs a fresh entry for `key`.
    ///
    /// Returns the new entry and the entry it replaced, if any. The replaced
    /// entry is retired; the caller must unlink it from the ordering list and
    /// promote the new one.
    pub fn set(&self, key: K, value: V, now: u64) -> (Arc<Entry<K, V>>, Option<Arc<Entry<K, V>>>) {
        let entry = Arc::new(Entry::new(key.clone(), value, now));
        let mut index = self.index.lock();
        let previous = index.insert(key, Arc::clone(&entry));
        match &previous {
            Some(previous) => previous.retire(),
            None => {
                self.indexed.fetch_add(1, Ordering::AcqRel);
            }
        }
        drop(index);
        (entry, previous)
    }

    // == Get ==
    /// Looks up the live entry for `key` without touching recency.
    pub fn get<Q>(&self, key: &Q) -> Option<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.lock().get(key).cloned()
    }

    // == Remove ==
    /// Removes and retires the entry for `key`.
    pub fn remove<Q>(&self, key: &Q) -> Option<Arc<Entry<K, V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut index = self.index.lock();
        let removed = index.remove(key);
        if let Some(entry) = &removed {
            entry.retire();
            self.indexed.fetch_sub(1, Ordering::AcqRel);
        }
        removed
    }

    // == Remove Entry ==
    /// Removes `entry` only if it is still the one indexed under its key.
    ///
    /// Returns `false` when the key is gone or now maps to a newer entry.
    pub fn remove_entry(&self, entry: &Arc<Entry<K, V>>) -> bool {
        let mut index = self.index.lock();
        match index.get(entry.key()) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                index.remove(entry.key());
                entry.retire();
                self.indexed.fetch_sub(1, Ordering::AcqRel);
                true
            }
            _ => false,
        }
    }

    // == Length ==
    /// Exact number of indexed entries in this shard.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.index.lock().is_empty()
    }
}

impl<K, V> Default for Shard<K, V>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_new() {
        let shard: Shard<String, i32> = Shard::new();
        assert_eq!(shard.len(), 0);
        assert!(shard.is_empty());
    }

    #[test]
    fn test_shard_set_and_get() {
        let shard = Shard::new();
        let (entry, previous) = shard.set("a".to_string(), 1, 0);

        assert!(previous.is_none());
        let found = shard.get("a").unwrap();
        assert!(Arc::ptr_eq(&found, &entry));
        assert_eq!(*found.value(), 1);
    }

    #[test]
    fn test_shard_set_replaces_and_retires() {
        let shard = Shard::new();
        let (first, _) = shard.set("a".to_string(), 1, 0);
        let (second, previous) = shard.set("a".to_string(), 2, 1);

        let previous = previous.unwrap();
        assert!(Arc::ptr_eq(&previous, &first));
        assert!(first.is_retired());
        assert!(!second.is_retired());
        assert_eq!(shard.len(), 1);
        assert_eq!(*shard.get("a").unwrap().value(), 2);
    }

    #[test]
    fn test_shard_remove() {
        let shard = Shard::new();
        shard.set("a".to_string(), 1, 0);

        let removed = shard.remove("a").unwrap();
        assert!(removed.is_retired());
        assert!(shard.get("a").is_none());
        assert!(shard.remove("a").is_none());
    }

    #[test]
    fn test_shared_counter_tracks_indexed_entries() {
        let indexed = Arc::new(AtomicUsize::new(0));
        let left = Shard::with_counter(Arc::clone(&indexed));
        let right = Shard::with_counter(Arc::clone(&indexed));

        let (a, _) = left.set("a".to_string(), 1, 0);
        right.set("b".to_string(), 2, 0);
        // Overwrites keep the count
        right.set("b".to_string(), 3, 1);
        assert_eq!(indexed.load(Ordering::Acquire), 2);

        assert!(left.remove_entry(&a));
        assert!(!left.remove_entry(&a));
        right.remove("b");
        right.remove("b");
        assert_eq!(indexed.load(Ordering::Acquire), 0);
    }

    #[test]
    fn test_shard_remove_entry_requires_identity() {
        let shard = Shard::new();
        let (stale, _) = shard.set("a".to_string(), 1, 0);
        let (fresh, _) = shard.set("a".to_string(), 2, 1);

        // The stale entry no longer owns the key
        assert!(!shard.remove_entry(&stale));
        assert_eq!(shard.len(), 1);

        assert!(shard.remove_entry(&fresh));
        assert!(fresh.is_retired());
        assert!(shard.is_empty());
    }
}
