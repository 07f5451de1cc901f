//! Cache Module
//!
//! Provides a sharded in-memory cache with LRU eviction and time-to-use
//! expiration.
//!
//! - [`router`] maps keys to shards
//! - `shard` holds one partition of the key index
//! - `coordinator` owns the global recency order on a dedicated thread
//! - [`store`] ties them together behind [`Cache`]

mod coordinator;
mod entry;
mod lru;
pub mod router;
mod shard;
mod stats;
pub mod store;


// Re-export public types
pub use entry::{Clock, Entry};
pub use router::{hash32, Encoded, FixedWidth, KeyRepr, KeyRouter, RouteKey};
pub use stats::CacheStats;
pub use store::Cache;
