//! Cache layer for scraped payloads and freshness markers.
//!
//! [`CacheStore`] is a byte-oriented key/value store with optional per-key
//! TTL. Two backends exist: [`DbCacheStore`] keeps entries in the catalog
//! database so they survive restarts, [`MemoryCacheStore`] keeps them in a
//! moka cache. [`CatalogCache`] layers typed JSON access, the key namespace
//! and the freshness-marker protocol on top of either backend.

mod catalog;
mod database;
mod keys;
mod memory;

pub use catalog::CatalogCache;
pub use database::DbCacheStore;
pub use keys::{
    Resource, ResourceClass, metadata_fail_key, metadata_key, popular_key, source_prefix,
};
pub use memory::MemoryCacheStore;

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Async key/value store with optional expiry.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the stored bytes, or `None` when absent or expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] when the backend cannot be reached.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Stores `value`; `ttl: None` keeps the entry until it is overwritten or
    /// deleted.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] when the backend cannot be reached.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Whole seconds until expiry. Zero when the key is absent, expired or
    /// has no TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] when the backend cannot be reached.
    async fn ttl_remaining(&self, key: &str) -> Result<u64, CacheError>;

    /// Deletes every key starting with `prefix` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] when the backend cannot be reached.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}
