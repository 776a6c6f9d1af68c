use crate::cache::{CatalogCache, metadata_fail_key, metadata_key, popular_key};
use crate::db::Store;
use crate::domain::{SourceId, TitleId};
use crate::entities::titles;
use crate::jobs::{Job, JobQueue};
use crate::models::catalog::{MetadataSnapshot, OngoingAnime, PopularTitle};
use crate::models::scrape::ParsedTitle;
use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// External anime database used to enrich titles.
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Best match for `query`, optionally narrowed by kind.
    async fn search(&self, query: &str, kind: Option<&str>) -> Result<Option<Value>>;

    async fn get(&self, id: i64) -> Result<Option<Value>>;

    /// One page (1-based) of currently airing anime, most popular first.
    async fn popular_ongoings(&self, page: u32) -> Result<Vec<OngoingAnime>>;
}

/// How long a page of the popular ongoing list is cached.
const POPULAR_TTL: Duration = Duration::from_secs(24 * 3600);

/// Provider pages scanned for ongoing titles the catalog knows.
const POPULAR_PAGES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataSettings {
    /// Snapshots older than this are served and refreshed in the background.
    pub expiration: Duration,
    /// How long a failed lookup suppresses new searches for a title.
    pub fail_cooldown: Duration,
    pub backfill_batch: u64,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            expiration: Duration::from_secs(7 * 24 * 3600),
            fail_cooldown: Duration::from_secs(5 * 60),
            backfill_batch: 20,
        }
    }
}

/// Outcome of enriching one title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub shikimori_id: Option<i64>,
    pub snapshot: Option<MetadataSnapshot>,
    pub failed: bool,
}

pub struct MetadataService {
    cache: CatalogCache,
    store: Store,
    provider: Option<Arc<dyn MetadataProvider>>,
    jobs: JobQueue,
    settings: MetadataSettings,
}

/// Maps a website's free-form kind onto the provider's kind filter.
#[must_use]
pub fn provider_kind(kind: Option<&str>) -> Option<&'static str> {
    let kind = kind?.trim().to_lowercase();
    match kind.as_str() {
        "tv" | "тв" | "тв-сериал" => Some("tv"),
        "movie" | "фильм" | "полнометражный фильм" => Some("movie"),
        "ova" => Some("ova"),
        "ona" => Some("ona"),
        "special" | "спешл" => Some("special"),
        "music" => Some("music"),
        _ => None,
    }
}

fn snapshot_id(value: &Value) -> Option<i64> {
    value.get("id").and_then(Value::as_i64)
}

impl MetadataService {
    #[must_use]
    pub fn new(
        cache: CatalogCache,
        store: Store,
        provider: Option<Arc<dyn MetadataProvider>>,
        jobs: JobQueue,
        settings: MetadataSettings,
    ) -> Self {
        Self {
            cache,
            store,
            provider,
            jobs,
            settings,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    #[must_use]
    pub const fn settings(&self) -> MetadataSettings {
        self.settings
    }

    /// Attaches metadata to a title page. Never fails: lookup errors set a
    /// short-lived marker and are reported through [`Enrichment::failed`].
    pub async fn enrich(&self, title: &titles::Model, detail: &ParsedTitle) -> Enrichment {
        let title_id = TitleId::from(title.id);

        if let Some(id) = title.shikimori_id {
            return Enrichment {
                shikimori_id: Some(id),
                snapshot: self.snapshot(id).await,
                failed: false,
            };
        }

        let Some(provider) = &self.provider else {
            return Enrichment::default();
        };

        if title.shikimori_fetched {
            return Enrichment::default();
        }

        let fail_key = metadata_fail_key(title_id);
        if self.cache.exists(&fail_key).await {
            return Enrichment {
                failed: true,
                ..Enrichment::default()
            };
        }

        let query = detail
            .en_name
            .as_deref()
            .or(title.en_name.as_deref())
            .unwrap_or(&detail.name);
        let kind = provider_kind(detail.kind.as_deref());

        match provider.search(query, kind).await {
            Ok(Some(value)) => match snapshot_id(&value) {
                Some(id) => {
                    let snapshot = self.store_snapshot(id, value).await;
                    self.jobs.enqueue(Job::SetMetadataId {
                        title: title_id,
                        shikimori_id: Some(id),
                    });
                    // Search results are abbreviated; fetch the full record.
                    self.jobs.enqueue(Job::RefreshMetadata { shikimori_id: id });
                    Enrichment {
                        shikimori_id: Some(id),
                        snapshot: Some(snapshot),
                        failed: false,
                    }
                }
                None => {
                    warn!(title_id = %title_id, "Metadata search result has no id");
                    self.jobs.enqueue(Job::SetMetadataId {
                        title: title_id,
                        shikimori_id: None,
                    });
                    Enrichment::default()
                }
            },
            Ok(None) => {
                debug!(title_id = %title_id, query, "No metadata match");
                self.jobs.enqueue(Job::SetMetadataId {
                    title: title_id,
                    shikimori_id: None,
                });
                Enrichment::default()
            }
            Err(e) => {
                warn!(title_id = %title_id, error = %e, "Metadata search failed");
                self.cache
                    .set_json(&fail_key, &true, Some(self.settings.fail_cooldown))
                    .await;
                Enrichment {
                    failed: true,
                    ..Enrichment::default()
                }
            }
        }
    }

    /// Cached snapshot of `id`; fetched synchronously when absent, refreshed
    /// in the background when expired.
    pub async fn snapshot(&self, id: i64) -> Option<MetadataSnapshot> {
        if let Some(snapshot) = self
            .cache
            .get_json::<MetadataSnapshot>(&metadata_key(id))
            .await
        {
            let age = Utc::now()
                .signed_duration_since(snapshot.last_fetch)
                .to_std()
                .unwrap_or_default();
            if age > self.settings.expiration && self.provider.is_some() {
                self.jobs.enqueue(Job::RefreshMetadata { shikimori_id: id });
            }
            return Some(snapshot);
        }

        match self.refresh(id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(shikimori_id = id, error = %e, "Metadata fetch failed");
                None
            }
        }
    }

    /// Fetches `id` from the provider and replaces the cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns the provider error.
    pub async fn refresh(&self, id: i64) -> Result<Option<MetadataSnapshot>> {
        let Some(provider) = &self.provider else {
            return Ok(None);
        };

        match provider.get(id).await? {
            Some(value) => Ok(Some(self.store_snapshot(id, value).await)),
            None => {
                debug!(shikimori_id = id, "Metadata record not found");
                Ok(None)
            }
        }
    }

    async fn store_snapshot(&self, id: i64, data: Value) -> MetadataSnapshot {
        let snapshot = MetadataSnapshot {
            last_fetch: Utc::now(),
            data,
        };
        self.cache
            .set_json(&metadata_key(id), &snapshot, None)
            .await;
        snapshot
    }

    /// Popular ongoing anime that at least one source carries, at most
    /// `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns provider errors for uncached pages and database errors.
    pub async fn popular_titles(&self, limit: usize) -> Result<Vec<PopularTitle>> {
        if self.provider.is_none() {
            return Ok(Vec::new());
        }

        let mut popular = Vec::new();
        for page in 1..=POPULAR_PAGES {
            for ongoing in self.popular_page(page).await? {
                let linked = self
                    .store
                    .find_titles_by_shikimori_id(ongoing.shikimori_id)
                    .await?;
                if let Some(title) = PopularTitle::link(ongoing, &linked) {
                    popular.push(title);
                }
                if popular.len() >= limit {
                    return Ok(popular);
                }
            }
        }
        Ok(popular)
    }

    async fn popular_page(&self, page: u32) -> Result<Vec<OngoingAnime>> {
        let key = popular_key(page);
        if let Some(cached) = self.cache.get_json::<Vec<OngoingAnime>>(&key).await {
            return Ok(cached);
        }

        let Some(provider) = &self.provider else {
            return Ok(Vec::new());
        };
        let ongoings = provider.popular_ongoings(page).await?;
        debug!(page, count = ongoings.len(), "Popular ongoings fetched");
        self.cache
            .set_json(&key, &ongoings, Some(POPULAR_TTL))
            .await;
        Ok(ongoings)
    }

    /// Looks up metadata for up to one batch of titles of `source` that were
    /// never searched. Returns the number of matches.
    ///
    /// # Errors
    ///
    /// Returns database errors; provider errors only mark the title.
    pub async fn backfill(&self, source: SourceId) -> Result<usize> {
        let Some(provider) = &self.provider else {
            return Ok(0);
        };

        let titles = self
            .store
            .list_titles_missing_metadata(source, self.settings.backfill_batch)
            .await?;
        let mut matched = 0;

        for title in titles {
            let title_id = TitleId::from(title.id);
            let fail_key = metadata_fail_key(title_id);
            if self.cache.exists(&fail_key).await {
                continue;
            }

            let query = title.en_name.as_deref().unwrap_or(&title.name);
            match provider.search(query, None).await {
                Ok(Some(value)) => {
                    let id = snapshot_id(&value);
                    if let Some(id) = id {
                        self.store_snapshot(id, value).await;
                        matched += 1;
                    }
                    self.store.set_title_shikimori_id(title_id, id).await?;
                }
                Ok(None) => {
                    self.store.set_title_shikimori_id(title_id, None).await?;
                }
                Err(e) => {
                    warn!(title_id = %title_id, error = %e, "Metadata search failed during backfill");
                    self.cache
                        .set_json(&fail_key, &true, Some(self.settings.fail_cooldown))
                        .await;
                }
            }
        }

        if matched > 0 {
            info!(source = %source, matched, "Metadata backfill matched titles");
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_site_kinds() {
        assert_eq!(provider_kind(Some("ТВ")), Some("tv"));
        assert_eq!(provider_kind(Some(" Фильм ")), Some("movie"));
        assert_eq!(provider_kind(Some("OVA")), Some("ova"));
        assert_eq!(provider_kind(Some("Дорама")), None);
        assert_eq!(provider_kind(None), None);
    }

    #[test]
    fn reads_snapshot_id() {
        assert_eq!(snapshot_id(&serde_json::json!({"id": 5114})), Some(5114));
        assert_eq!(snapshot_id(&serde_json::json!({"name": "x"})), None);
    }
}
