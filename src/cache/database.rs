use super::{CacheError, CacheStore};
use crate::db::Store;
use std::time::Duration;

/// [`CacheStore`] persisted in the `cache_entries` table.
#[derive(Clone)]
pub struct DbCacheStore {
    store: Store,
}

impl DbCacheStore {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

fn unavailable(e: anyhow::Error) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

#[async_trait::async_trait]
impl CacheStore for DbCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let entry = self.store.get_cache_entry(key).await.map_err(unavailable)?;
        Ok(entry.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), CacheError> {
        let ttl_millis = ttl.map(|ttl| i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));
        self.store
            .set_cache_entry(key, value, ttl_millis)
            .await
            .map_err(unavailable)
    }

    async fn ttl_remaining(&self, key: &str) -> Result<u64, CacheError> {
        let entry = self.store.get_cache_entry(key).await.map_err(unavailable)?;
        let now = chrono::Utc::now().timestamp_millis();

        Ok(entry
            .and_then(|e| e.expires_at)
            .map_or(0, |at| u64::try_from((at - now).max(0) / 1000).unwrap_or(0)))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        self.store
            .delete_cache_prefix(prefix)
            .await
            .map_err(unavailable)
    }
}
