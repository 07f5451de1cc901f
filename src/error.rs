//! Error types for the cache
//!
//! Provides unified error handling using thiserror. A cache miss is never an
//! error: lookups report it as `Ok(None)`.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A construction option is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The fallback encoder could not turn a key into bytes for routing
    #[error("Key of type {type_name} cannot be encoded for routing: {source}")]
    UnencodableKey {
        /// Rust type name of the offending key
        type_name: &'static str,
        /// Underlying encoder failure
        #[source]
        source: serde_json::Error,
    },

    /// The recency coordinator has been stopped
    #[error("Cache has been stopped")]
    Stopped,

    /// The coordinator thread could not be started
    #[error("Failed to start coordinator: {0}")]
    Spawn(#[from] std::io::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
