use super::keys::{Resource, source_prefix};
use super::{CacheError, CacheStore};
use crate::domain::SourceId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Typed access to the cache plus the freshness-marker protocol.
///
/// Backend failures never reach callers: a failed read is a miss, a failed
/// marker read means stale, a failed write is logged and dropped.
#[derive(Clone)]
pub struct CatalogCache {
    store: Arc<dyn CacheStore>,
}

impl CatalogCache {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Cached payload of `resource`, if any.
    pub async fn read<T: DeserializeOwned>(&self, resource: &Resource) -> Option<T> {
        let value = self.get_json(&resource.payload_key()).await;
        let outcome = if value.is_some() { "hit" } else { "miss" };
        metrics::counter!(
            "catalog_cache_reads_total",
            "source" => resource.source().as_str(),
            "resource" => resource.kind(),
            "outcome" => outcome
        )
        .increment(1);
        value
    }

    /// Stores the payload without an expiry; freshness lives in the marker.
    pub async fn write<T: Serialize>(&self, resource: &Resource, value: &T) {
        self.set_json(&resource.payload_key(), value, None).await;
    }

    /// True iff the freshness marker is absent.
    pub async fn is_stale(&self, resource: &Resource) -> bool {
        match self.store.get(&resource.marker_key()).await {
            Ok(marker) => marker.is_none(),
            Err(e) => {
                warn!(key = %resource.marker_key(), error = %e, "Freshness check failed, treating as stale");
                true
            }
        }
    }

    pub async fn mark_fresh(&self, resource: &Resource, period: Duration) {
        if let Err(e) = self
            .store
            .set(&resource.marker_key(), b"1".to_vec(), Some(period))
            .await
        {
            warn!(key = %resource.marker_key(), error = %e, "Failed to set freshness marker");
        }
    }

    /// Time left before the marker of `resource` expires.
    pub async fn expires_in(&self, resource: &Resource) -> Duration {
        match self.store.ttl_remaining(&resource.marker_key()).await {
            Ok(secs) => Duration::from_secs(secs),
            Err(e) => {
                warn!(key = %resource.marker_key(), error = %e, "TTL lookup failed");
                Duration::ZERO
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.store.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                // Payload written by an older layout; refetching replaces it.
                debug!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        if let Err(e) = self.store.set(key, bytes, ttl).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    /// Whether a plain key is present (used for fail markers).
    pub async fn exists(&self, key: &str) -> bool {
        matches!(self.store.get(key).await, Ok(Some(_)))
    }

    /// Drops every payload and marker of `source`.
    ///
    /// # Errors
    ///
    /// Returns the backend error; flushing is an explicit operator action.
    pub async fn flush_source(&self, source: SourceId) -> Result<u64, CacheError> {
        self.store.delete_prefix(&source_prefix(source)).await
    }
}
