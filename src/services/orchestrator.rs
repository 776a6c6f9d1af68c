//! Per-source read-through cache with background refresh.
//!
//! Every public read follows the same decision table on the cached payload
//! and its freshness marker:
//!
//! | payload | marker  | action                                          |
//! |---------|---------|-------------------------------------------------|
//! | absent  | any     | fetch from the website now, cache, mark fresh   |
//! | present | absent  | return cached, enqueue one background refresh   |
//! | present | present | return cached                                   |
//!
//! Scraped records are then reconciled against the catalog database: first
//! sightings are inserted right away so every response carries stable ids,
//! changed fields are written by background jobs.

use crate::cache::{CacheError, CatalogCache, Resource, ResourceClass};
use crate::db::Store;
use crate::domain::{GenreId, SourceId, TitleId};
use crate::entities::{genres, titles};
use crate::jobs::{Job, JobQueue};
use crate::models::catalog::{
    Episode, Genre, MainPage, TitleDetail, TitleLink, TitleShort, TitlesPage,
};
use crate::models::scrape::{
    ParsedEpisode, ParsedGenre, ParsedTitle, ParsedTitleShort, ParsedTitlesPage,
};
use crate::models::update::TitleUpdate;
use crate::services::duration::ProbeTarget;
use crate::services::metadata::MetadataService;
use crate::sources::{AdapterError, SiteAdapter};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to fetch from {site}: {message}")]
    Upstream { site: SourceId, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{site} does not support {what}")]
    Unsupported { site: SourceId, what: &'static str },

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Tunables of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceSettings {
    /// Marker TTL for listing pages, title pages and genre pages.
    pub titles_period: Duration,
    /// Marker TTL for the genre list.
    pub genres_period: Duration,
    /// Listing pages shown on the main page and walked by a full refresh.
    pub main_pages: u32,
    /// Pause between pages of a full refresh.
    pub page_delay: Duration,
    pub probe_durations: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            titles_period: Duration::from_secs(6 * 3600),
            genres_period: Duration::from_secs(168 * 3600),
            main_pages: 3,
            page_delay: Duration::from_millis(1500),
            probe_durations: true,
        }
    }
}

impl SourceSettings {
    #[must_use]
    pub const fn period(&self, class: ResourceClass) -> Duration {
        match class {
            ResourceClass::Titles => self.titles_period,
            ResourceClass::Genres => self.genres_period,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub pages_refreshed: u32,
    pub pages_failed: u32,
}

/// Titles per page of a genre served from the catalog database.
const STORED_GENRE_PAGE_SIZE: u64 = 20;

fn normalize_genre(name: &str) -> String {
    name.trim().to_lowercase()
}

pub struct Orchestrator {
    source: SourceId,
    adapter: Arc<dyn SiteAdapter>,
    cache: CatalogCache,
    store: Store,
    jobs: JobQueue,
    metadata: Arc<MetadataService>,
    settings: SourceSettings,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        source: SourceId,
        adapter: Arc<dyn SiteAdapter>,
        cache: CatalogCache,
        store: Store,
        jobs: JobQueue,
        metadata: Arc<MetadataService>,
        settings: SourceSettings,
    ) -> Self {
        Self {
            source,
            adapter,
            cache,
            store,
            jobs,
            metadata,
            settings,
        }
    }

    #[must_use]
    pub const fn source(&self) -> SourceId {
        self.source
    }

    #[must_use]
    pub const fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    // Reads

    /// One listing page, 1-based.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Upstream`] when nothing is cached and the
    /// website cannot be read.
    pub async fn get_titles(&self, page: u32) -> Result<TitlesPage, CatalogError> {
        if page == 0 {
            return Err(CatalogError::Validation("page must be at least 1".to_string()));
        }

        let resource = Resource::TitlesPage {
            source: self.source,
            page,
        };
        let job = Job::RefreshTitlesPage {
            source: self.source,
            page,
        };
        let raw: ParsedTitlesPage = self
            .read_through(resource, job, || self.refresh_titles_page(page))
            .await?;

        Ok(TitlesPage {
            titles: self.prepare_titles(&raw.titles).await?,
            total_pages: raw.total_pages,
        })
    }

    /// The first `main_pages` listing pages merged into one list.
    ///
    /// # Errors
    ///
    /// Only a failure of the first page is reported; later pages that fail
    /// shorten the list.
    pub async fn get_main_titles(&self) -> Result<MainPage, CatalogError> {
        let mut titles = Vec::new();
        let mut seen = HashSet::new();
        let mut total_pages = 0;

        for page in 1..=self.settings.main_pages.max(1) {
            match self.get_titles(page).await {
                Ok(listing) => {
                    total_pages = listing.total_pages;
                    titles.extend(listing.titles.into_iter().filter(|t| seen.insert(t.id)));
                    if page >= listing.total_pages {
                        break;
                    }
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    warn!(source = %self.source, page, error = %e, "Main page truncated");
                    break;
                }
            }
        }

        Ok(MainPage {
            titles,
            total_pages,
            pages_on_main: self.settings.main_pages,
        })
    }

    /// Full title page for a persisted title of this source.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when the website no longer has the
    /// title and nothing is cached.
    pub async fn get_title(&self, row: &titles::Model) -> Result<TitleDetail, CatalogError> {
        let title_id = TitleId::from(row.id);
        let resource = Resource::Title {
            source: self.source,
            title: title_id,
        };
        let job = Job::RefreshTitle {
            source: self.source,
            title: title_id,
            id_on_website: row.id_on_website.clone(),
        };
        let detail: ParsedTitle = self
            .read_through(resource, job, || {
                self.refresh_title(title_id, &row.id_on_website)
            })
            .await?;

        if let Some(update) = TitleUpdate::from_detail(row, &detail) {
            self.jobs.enqueue(Job::UpdateTitle {
                title: title_id,
                update,
            });
        }

        let related_raw: Vec<ParsedTitleShort> = detail
            .related_titles
            .iter()
            .cloned()
            .map(ParsedTitleShort::from)
            .collect();
        let related = self.prepare_titles(&related_raw).await?;
        let recommended = self.prepare_titles(&detail.recommended_titles).await?;
        let genres = self.resolve_genres(title_id, &detail.genres_names).await?;
        let episodes = self.prepare_episodes(title_id, &detail.episodes_list).await?;

        let enrichment = self.metadata.enrich(row, &detail).await;
        let on_other_sources = match enrichment.shikimori_id {
            Some(id) => self.other_sources(title_id, id).await?,
            None => Vec::new(),
        };

        Ok(TitleDetail {
            title: TitleShort::merge(self.source, row, &detail.to_short()),
            description: detail.description,
            series_info: detail.series_info,
            year: detail.year,
            kind: detail.kind,
            duration: detail.duration,
            episodes_message: detail.episodes_message,
            genres,
            episodes,
            related,
            recommended,
            shikimori: enrichment.snapshot,
            shikimori_failed: enrichment.failed,
            on_other_sources,
        })
    }

    /// Genre list of this source. Websites without a genre list serve the
    /// genres collected from their title pages.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Upstream`] when nothing is cached and the
    /// website cannot be read.
    pub async fn get_genres(&self) -> Result<Vec<Genre>, CatalogError> {
        if !self.adapter.lists_genres() {
            return self.stored_genres().await;
        }

        let resource = Resource::Genres {
            source: self.source,
        };
        let job = Job::RefreshGenres {
            source: self.source,
        };
        match self
            .read_through(resource, job, || self.refresh_genres())
            .await
        {
            Ok(raw) => self.prepare_genres(&raw).await,
            Err(CatalogError::Unsupported { .. }) => self.stored_genres().await,
            Err(e) => Err(e),
        }
    }

    async fn stored_genres(&self) -> Result<Vec<Genre>, CatalogError> {
        Ok(self
            .store
            .list_genres(self.source)
            .await?
            .iter()
            .map(|row| Genre::from_row(self.source, row))
            .collect())
    }

    /// One page of titles of a persisted genre.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Upstream`] when nothing is cached and the
    /// website cannot be read.
    pub async fn get_genre(
        &self,
        genre: &genres::Model,
        page: u32,
    ) -> Result<TitlesPage, CatalogError> {
        if page == 0 {
            return Err(CatalogError::Validation("page must be at least 1".to_string()));
        }

        let genre_id = GenreId::from(genre.id);
        if !self.adapter.lists_genres() {
            return self.stored_genre_page(genre_id, page).await;
        }

        let resource = Resource::GenrePage {
            source: self.source,
            genre: genre_id,
            page,
        };
        let job = Job::RefreshGenrePage {
            source: self.source,
            genre: genre_id,
            genre_id_on_website: genre.id_on_website.clone(),
            page,
        };
        let raw: ParsedTitlesPage = self
            .read_through(resource, job, || {
                self.refresh_genre_page(genre_id, &genre.id_on_website, page)
            })
            .await?;

        Ok(TitlesPage {
            titles: self.prepare_titles(&raw.titles).await?,
            total_pages: raw.total_pages,
        })
    }

    /// Titles linked to a collected genre, by name.
    async fn stored_genre_page(
        &self,
        genre: GenreId,
        page: u32,
    ) -> Result<TitlesPage, CatalogError> {
        let (rows, total_pages) = self
            .store
            .list_genre_titles(genre, u64::from(page), STORED_GENRE_PAGE_SIZE)
            .await?;

        Ok(TitlesPage {
            titles: rows
                .iter()
                .map(|row| TitleShort::from_row(self.source, row))
                .collect(),
            total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
        })
    }

    async fn read_through<T, F, Fut>(
        &self,
        resource: Resource,
        job: Job,
        fetch: F,
    ) -> Result<T, CatalogError>
    where
        T: DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        if let Some(cached) = self.cache.read::<T>(&resource).await {
            if self.cache.is_stale(&resource).await {
                debug!(source = %self.source, resource = resource.kind(), "Serving stale payload");
                self.jobs.enqueue(job);
            }
            return Ok(cached);
        }

        debug!(source = %self.source, resource = resource.kind(), "Cache miss, fetching");
        fetch().await
    }

    // Refreshes

    async fn call_adapter<T, Fut>(&self, operation: &'static str, call: Fut) -> Result<T, CatalogError>
    where
        Fut: Future<Output = Result<T, AdapterError>>,
    {
        let start = Instant::now();
        let result = call.await;
        let outcome = if result.is_ok() { "success" } else { "failure" };

        metrics::counter!(
            "adapter_fetches_total",
            "source" => self.source.as_str(),
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!(
            "adapter_fetch_duration_seconds",
            "source" => self.source.as_str(),
            "operation" => operation
        )
        .record(start.elapsed().as_secs_f64());

        result.map_err(|e| match e {
            AdapterError::NotFound(what) => CatalogError::NotFound(what),
            AdapterError::Unsupported(what) => CatalogError::Unsupported {
                site: self.source,
                what,
            },
            other => CatalogError::Upstream {
                site: self.source,
                message: other.to_string(),
            },
        })
    }

    async fn store_fresh<T: serde::Serialize>(&self, resource: &Resource, value: &T) {
        self.cache.write(resource, value).await;
        self.cache
            .mark_fresh(resource, self.settings.period(resource.class()))
            .await;
    }

    /// Fetches a listing page and replaces its cache entry.
    ///
    /// # Errors
    ///
    /// Returns the adapter error mapped to [`CatalogError`].
    pub async fn refresh_titles_page(&self, page: u32) -> Result<ParsedTitlesPage, CatalogError> {
        let raw = self
            .call_adapter("list_titles", self.adapter.list_titles(page))
            .await?;
        let resource = Resource::TitlesPage {
            source: self.source,
            page,
        };
        self.store_fresh(&resource, &raw).await;
        Ok(raw)
    }

    /// # Errors
    ///
    /// Returns the adapter error mapped to [`CatalogError`].
    pub async fn refresh_title(
        &self,
        title: TitleId,
        id_on_website: &str,
    ) -> Result<ParsedTitle, CatalogError> {
        let detail = self
            .call_adapter("get_title", self.adapter.get_title(id_on_website))
            .await?;
        let resource = Resource::Title {
            source: self.source,
            title,
        };
        self.store_fresh(&resource, &detail).await;
        Ok(detail)
    }

    /// # Errors
    ///
    /// Returns the adapter error mapped to [`CatalogError`].
    pub async fn refresh_genres(&self) -> Result<Vec<ParsedGenre>, CatalogError> {
        let genres = self
            .call_adapter("list_genres", self.adapter.list_genres())
            .await?;
        let resource = Resource::Genres {
            source: self.source,
        };
        self.store_fresh(&resource, &genres).await;
        Ok(genres)
    }

    /// # Errors
    ///
    /// Returns the adapter error mapped to [`CatalogError`].
    pub async fn refresh_genre_page(
        &self,
        genre: GenreId,
        genre_id_on_website: &str,
        page: u32,
    ) -> Result<ParsedTitlesPage, CatalogError> {
        let raw = self
            .call_adapter(
                "list_genre_titles",
                self.adapter.list_genre_titles(genre_id_on_website, page),
            )
            .await?;
        let resource = Resource::GenrePage {
            source: self.source,
            genre,
            page,
        };
        self.store_fresh(&resource, &raw).await;
        Ok(raw)
    }

    /// Refreshes the main listing pages one after another and reconciles
    /// their titles.
    ///
    /// # Errors
    ///
    /// Fails only when every page failed; the last error is returned.
    pub async fn full_refresh(&self) -> Result<RefreshSummary, CatalogError> {
        let mut summary = RefreshSummary::default();
        let mut last_error = None;

        for page in 1..=self.settings.main_pages.max(1) {
            if page > 1 && !self.settings.page_delay.is_zero() {
                tokio::time::sleep(self.settings.page_delay).await;
            }

            match self.refresh_titles_page(page).await {
                Ok(raw) => {
                    summary.pages_refreshed += 1;
                    if let Err(e) = self.prepare_titles(&raw.titles).await {
                        warn!(source = %self.source, page, error = %e, "Failed to reconcile refreshed page");
                    }
                    if page >= raw.total_pages {
                        break;
                    }
                }
                Err(e) => {
                    warn!(source = %self.source, page, error = %e, "Page refresh failed");
                    summary.pages_failed += 1;
                    last_error = Some(e);
                }
            }
        }

        if summary.pages_refreshed == 0
            && let Some(e) = last_error
        {
            return Err(e);
        }

        info!(
            source = %self.source,
            pages_refreshed = summary.pages_refreshed,
            pages_failed = summary.pages_failed,
            "Full refresh finished"
        );
        Ok(summary)
    }

    /// Drops every cached payload and marker of this source.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Cache`] when the backend is unavailable.
    pub async fn flush_cache(&self) -> Result<u64, CatalogError> {
        let removed = self.cache.flush_source(self.source).await?;
        info!(source = %self.source, removed, "Source cache flushed");
        Ok(removed)
    }

    /// Maps a website id to a catalog title, scraping and inserting it when
    /// it was never listed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when the website does not know the id.
    pub async fn resolve_external_title(
        &self,
        id_on_website: &str,
    ) -> Result<TitleShort, CatalogError> {
        let id_on_website = id_on_website.trim();
        if id_on_website.is_empty() {
            return Err(CatalogError::Validation("website id is empty".to_string()));
        }

        if let Some(row) = self
            .store
            .find_title_by_natural_key(self.source, id_on_website)
            .await?
        {
            return Ok(TitleShort::from_row(self.source, &row));
        }

        let detail = self
            .call_adapter("get_title", self.adapter.get_title(id_on_website))
            .await?;
        let short = detail.to_short();
        let row = self.store.create_title(self.source, &short).await?;

        let resource = Resource::Title {
            source: self.source,
            title: TitleId::from(row.id),
        };
        self.store_fresh(&resource, &detail).await;

        Ok(TitleShort::merge(self.source, &row, &short))
    }

    /// Maps a genre as the website names it, e.g. in an old link, to a
    /// persisted genre of this source. Matches the website id exactly or the
    /// name after trimming and lowercasing.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] when no genre of this source matches.
    pub async fn resolve_genre_name(&self, name: &str) -> Result<Genre, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::Validation("genre name is empty".to_string()));
        }

        let wanted = normalize_genre(name);
        self.store
            .list_genres(self.source)
            .await?
            .iter()
            .find(|g| g.id_on_website == name || normalize_genre(&g.name) == wanted)
            .map(|g| Genre::from_row(self.source, g))
            .ok_or_else(|| CatalogError::NotFound(format!("genre '{name}' on {}", self.source)))
    }

    // Reconciliation

    /// Attaches persisted identities to scraped listing entries, inserting
    /// first sightings and queueing updates for changed ones. Output order
    /// follows `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] when the lookup or an insert fails.
    pub async fn prepare_titles(
        &self,
        raw: &[ParsedTitleShort],
    ) -> Result<Vec<TitleShort>, CatalogError> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = raw.iter().map(|t| t.id_on_website.clone()).collect();
        let mut known: HashMap<String, titles::Model> = self
            .store
            .find_titles_by_natural_keys(self.source, &keys)
            .await?
            .into_iter()
            .map(|row| (row.id_on_website.clone(), row))
            .collect();

        let mut checked: HashSet<Uuid> = HashSet::new();
        let mut titles = Vec::with_capacity(raw.len());

        for item in raw {
            let row = if let Some(row) = known.get(&item.id_on_website) {
                if checked.insert(row.id)
                    && let Some(update) = TitleUpdate::from_listing(row, item)
                {
                    self.jobs.enqueue(Job::UpdateTitle {
                        title: row.id.into(),
                        update,
                    });
                }
                row.clone()
            } else {
                let row = self.store.create_title(self.source, item).await?;
                debug!(source = %self.source, id_on_website = %item.id_on_website, "New title");
                checked.insert(row.id);
                known.insert(item.id_on_website.clone(), row.clone());
                row
            };

            titles.push(TitleShort::merge(self.source, &row, item));
        }

        Ok(titles)
    }

    async fn prepare_genres(&self, raw: &[ParsedGenre]) -> Result<Vec<Genre>, CatalogError> {
        let keys: Vec<String> = raw.iter().map(|g| g.id_on_website.clone()).collect();
        let mut known: HashMap<String, genres::Model> = self
            .store
            .find_genres_by_natural_keys(self.source, &keys)
            .await?
            .into_iter()
            .map(|row| (row.id_on_website.clone(), row))
            .collect();

        let mut genres = Vec::with_capacity(raw.len());
        for item in raw {
            if let Some(row) = known.get(&item.id_on_website) {
                if row.name != item.name {
                    self.jobs.enqueue(Job::RenameGenre {
                        genre: row.id.into(),
                        name: item.name.clone(),
                    });
                }
                genres.push(Genre::from_row(self.source, row));
                continue;
            }

            let row = self.store.create_genre(self.source, item).await?;
            genres.push(Genre::from_row(self.source, &row));
            known.insert(item.id_on_website.clone(), row);
        }

        Ok(genres)
    }

    /// Matches scraped genre names against the persisted genres of this
    /// source and queues a relink when the title's links are missing any.
    ///
    /// Unmatched names are dropped for websites with a genre list. Websites
    /// without one get a genre per name, keyed by the normalized name.
    async fn resolve_genres(
        &self,
        title: TitleId,
        names: &[String],
    ) -> Result<Vec<Genre>, CatalogError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let by_name: HashMap<String, genres::Model> = self
            .store
            .list_genres(self.source)
            .await?
            .into_iter()
            .map(|g| (normalize_genre(&g.name), g))
            .collect();
        let collect_missing = !self.adapter.lists_genres();

        let mut seen = HashSet::new();
        let mut matched: Vec<genres::Model> = Vec::new();
        for name in names {
            let key = normalize_genre(name);
            if key.is_empty() || !seen.insert(key.clone()) {
                continue;
            }

            if let Some(row) = by_name.get(&key) {
                matched.push(row.clone());
            } else if collect_missing {
                let parsed = ParsedGenre {
                    id_on_website: key,
                    name: name.trim().to_string(),
                };
                let row = self.store.create_genre(self.source, &parsed).await?;
                debug!(source = %self.source, genre = %row.name, "New genre from title page");
                matched.push(row);
            }
        }

        if matched.is_empty() {
            return Ok(Vec::new());
        }

        let linked: HashSet<Uuid> = self
            .store
            .genres_for_title(title)
            .await?
            .into_iter()
            .map(|g| g.id)
            .collect();
        if matched.iter().any(|g| !linked.contains(&g.id)) {
            self.jobs.enqueue(Job::LinkGenres {
                title,
                genres: matched.iter().map(|g| GenreId::from(g.id)).collect(),
            });
        }

        Ok(matched
            .iter()
            .map(|g| Genre::from_row(self.source, g))
            .collect())
    }

    /// Ensures an episode row exists for every scraped episode and queues a
    /// duration probe for those never probed.
    async fn prepare_episodes(
        &self,
        title: TitleId,
        scraped: &[ParsedEpisode],
    ) -> Result<Vec<Episode>, CatalogError> {
        if scraped.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = self.store.list_episodes(title).await?;
        let mut numbers: HashSet<i32> = rows.iter().map(|e| e.number).collect();
        let missing: Vec<&ParsedEpisode> = scraped
            .iter()
            .filter(|e| numbers.insert(e.number))
            .collect();
        if !missing.is_empty() {
            self.store.create_missing_episodes(title, &missing).await?;
            rows = self.store.list_episodes(title).await?;
        }

        let by_number: HashMap<i32, _> = rows.iter().map(|row| (row.number, row)).collect();
        let mut probes = Vec::new();
        let mut episodes = Vec::with_capacity(scraped.len());

        for parsed in scraped {
            let Some(row) = by_number.get(&parsed.number) else {
                continue;
            };

            if self.settings.probe_durations
                && row.duration.is_none()
                && !row.duration_fetched
                && let Some(link) = parsed.preferred_link()
            {
                probes.push(ProbeTarget {
                    episode: row.id.into(),
                    url: link.link.clone(),
                    is_m3u8: parsed.is_m3u8,
                });
            }

            episodes.push(Episode {
                id: row.id.into(),
                number: parsed.number,
                name: parsed.name.clone(),
                is_m3u8: parsed.is_m3u8,
                image_url: parsed.preview.clone(),
                duration: row.duration,
                duration_label: Episode::duration_label(row.duration),
                links: parsed.links.clone(),
            });
        }

        if !probes.is_empty() {
            self.jobs.enqueue(Job::ProbeDurations {
                title,
                episodes: probes,
            });
        }

        Ok(episodes)
    }

    async fn other_sources(
        &self,
        title: TitleId,
        shikimori_id: i64,
    ) -> Result<Vec<TitleLink>, CatalogError> {
        let rows = self.store.find_titles_by_shikimori_id(shikimori_id).await?;
        Ok(rows
            .iter()
            .filter(|row| row.id != title.value())
            .filter_map(TitleLink::from_row)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genre_names_compare_trimmed_and_lowercased() {
        assert_eq!(normalize_genre("  Комедия "), normalize_genre("комедия"));
        assert_ne!(normalize_genre("Drama"), normalize_genre("Dramas"));
    }

    #[test]
    fn genre_list_uses_its_own_period() {
        let settings = SourceSettings::default();
        assert_eq!(settings.period(ResourceClass::Genres), Duration::from_secs(168 * 3600));
        assert_eq!(settings.period(ResourceClass::Titles), Duration::from_secs(6 * 3600));
    }

    #[test]
    fn upstream_error_names_the_source() {
        let err = CatalogError::Upstream {
            site: SourceId::Animevost,
            message: "HTTP 503".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to fetch from animevost: HTTP 503");
    }
}
