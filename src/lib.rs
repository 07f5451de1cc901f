//! TTU Cache - a sharded, concurrency-safe LRU cache with time-to-use expiry
//!
//! Keys are spread over independently locked shards, while a single
//! coordinator thread keeps one global recency order across all of them.
//! Entries that go unused for longer than the configured time-to-use are
//! treated as absent and removed by lookups or by [`Cache::purge`].
//!
//! ```
//! use std::time::Duration;
//! use ttu_cache::{Cache, CacheConfig};
//!
//! let cache = Cache::new(
//!     CacheConfig::new()
//!         .with_capacity(1_000)
//!         .with_shards(8)
//!         .with_ttu(Duration::from_secs(30)),
//! )
//! .unwrap();
//!
//! cache.add(42u64, "answer".to_string()).unwrap();
//! assert_eq!(cache.get(&42u64).unwrap().as_deref(), Some("answer"));
//! cache.stop();
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheStats, Encoded, KeyRepr, KeyRouter, RouteKey};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::{spawn_purger, PurgerHandle};
