//! Configuration Module
//!
//! Construction-time options for a cache: capacity, time-to-use, shard count,
//! cool-off period and coordinator queue depth. Values are fixed once the
//! cache is built.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Default depth of each coordinator queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 10_000;

/// Cache configuration parameters.
///
/// The default is an unbounded, never-expiring, single-shard cache that
/// promotes on every hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries, 0 = unbounded
    pub capacity: usize,
    /// Time-to-use, zero = entries never expire
    pub ttu: Duration,
    /// Number of index shards, at least 1
    pub shards: usize,
    /// Minimum interval between promotions of the same entry, zero = always promote
    pub cool_off: Duration,
    /// Bound of each coordinator queue; producers block when it is full
    pub queue_depth: usize,
}

impl CacheConfig {
    /// Creates a config with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the capacity. Zero means unbounded.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the time-to-use. Zero disables expiration.
    pub fn with_ttu(mut self, ttu: Duration) -> Self {
        self.ttu = ttu;
        self
    }

    /// Sets the shard count.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Sets the cool-off period.
    pub fn with_cool_off(mut self, cool_off: Duration) -> Self {
        self.cool_off = cool_off;
        self
    }

    /// Sets the coordinator queue depth.
    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    /// Checks that every option is in range.
    pub fn validate(&self) -> Result<()> {
        if self.shards < 1 {
            return Err(CacheError::InvalidConfig(format!(
                "the number of shards must be at least 1, got {}",
                self.shards
            )));
        }
        if self.queue_depth < 1 {
            return Err(CacheError::InvalidConfig(format!(
                "the queue depth must be at least 1, got {}",
                self.queue_depth
            )));
        }
        Ok(())
    }

    /// Creates a new CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum live entries (default: 0, unbounded)
    /// - `CACHE_TTU_MS` - Time-to-use in milliseconds (default: 0, never expires)
    /// - `CACHE_SHARDS` - Number of shards (default: 1)
    /// - `CACHE_COOL_OFF_MS` - Cool-off in milliseconds (default: 0)
    /// - `CACHE_QUEUE_DEPTH` - Coordinator queue depth (default: 10000)
    ///
    /// Unset or unparsable variables fall back to their default. Range
    /// checks happen in [`validate`](Self::validate).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            capacity: env_parse("CACHE_CAPACITY").unwrap_or(defaults.capacity),
            ttu: env_parse("CACHE_TTU_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.ttu),
            shards: env_parse("CACHE_SHARDS").unwrap_or(defaults.shards),
            cool_off: env_parse("CACHE_COOL_OFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.cool_off),
            queue_depth: env_parse("CACHE_QUEUE_DEPTH").unwrap_or(defaults.queue_depth),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 0,
            ttu: Duration::ZERO,
            shards: 1,
            cool_off: Duration::ZERO,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
