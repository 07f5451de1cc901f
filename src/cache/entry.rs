//! Cache Entry Module
//!
//! Defines a single cached record and the monotonic clock its last-use
//! timestamps are measured against.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Slot value of an entry that is not linked into the ordering list.
pub(crate) const UNLINKED: usize = usize::MAX;

// == Clock ==
/// Monotonic clock reporting nanoseconds since the cache was built.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    /// Starts a clock at the current instant.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since the clock started.
    pub fn now(&self) -> u64 {
        as_nanos(self.epoch.elapsed())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a duration to nanoseconds, saturating at `u64::MAX`.
pub(crate) fn as_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

// == Entry ==
/// One cached record.
///
/// The key and value never change after construction: an overwrite installs
/// a fresh entry, so readers can never observe a half-written value. The
/// shard index owns the entry by key, and the coordinator owns its position
/// in the ordering list through `slot`.
#[derive(Debug)]
pub struct Entry<K, V> {
    key: K,
    value: V,
    /// Last use, in [`Clock`] nanoseconds
    last_use: AtomicU64,
    /// Ordering-list slot, written only by the coordinator
    slot: AtomicUsize,
    /// Set once the entry has left its shard index
    retired: AtomicBool,
}

impl<K, V> Entry<K, V> {
    // == Constructor ==
    /// Creates an unlinked entry last used at `now`.
    pub fn new(key: K, value: V, now: u64) -> Self {
        Self {
            key,
            value,
            last_use: AtomicU64::new(now),
            slot: AtomicUsize::new(UNLINKED),
            retired: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Last use in clock nanoseconds.
    pub fn last_use(&self) -> u64 {
        self.last_use.load(Ordering::Relaxed)
    }

    /// Marks the entry as used at `now`.
    pub fn touch(&self, now: u64) {
        self.last_use.fetch_max(now, Ordering::Relaxed);
    }

    // == Is Expired ==
    /// Checks whether `last_use + ttu < now`.
    ///
    /// A zero `ttu` disables expiration.
    pub fn is_expired(&self, ttu: Duration, now: u64) -> bool {
        if ttu.is_zero() {
            return false;
        }
        self.last_use().saturating_add(as_nanos(ttu)) < now
    }

    // == Cooling ==
    /// Checks whether the entry was used less than `cool_off` ago.
    ///
    /// A zero `cool_off` never cools.
    pub fn is_cooling(&self, cool_off: Duration, now: u64) -> bool {
        if cool_off.is_zero() {
            return false;
        }
        now.saturating_sub(self.last_use()) < as_nanos(cool_off)
    }

    pub(crate) fn retire(&self) {
        self.retired.store(true, Ordering::Release);
    }

    pub(crate) fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub(crate) fn slot(&self) -> Option<usize> {
        match self.slot.load(Ordering::Relaxed) {
            UNLINKED => None,
            slot => Some(slot),
        }
    }

    pub(crate) fn set_slot(&self, slot: Option<usize>) {
        self.slot.store(slot.unwrap_or(UNLINKED), Ordering::Relaxed);
    }
}
