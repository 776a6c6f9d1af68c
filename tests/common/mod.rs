#![allow(dead_code)]

use anicat::config::{CacheBackend, Config, SourceConfig};
use anicat::db::Store;
use anicat::domain::SourceId;
use anicat::jobs::{JobReceiver, WorkerPool};
use anicat::models::catalog::OngoingAnime;
use anicat::models::scrape::{
    ParsedEpisode, ParsedGenre, ParsedLink, ParsedTitle, ParsedTitleShort, ParsedTitlesPage,
};
use anicat::services::{MetadataProvider, Orchestrator};
use anicat::sources::{AdapterError, SiteAdapter};
use anicat::state::SharedState;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory website. Every adapter call is counted.
#[derive(Default)]
pub struct MockAdapter {
    pages: Mutex<HashMap<u32, ParsedTitlesPage>>,
    titles: Mutex<HashMap<String, ParsedTitle>>,
    genres: Mutex<Vec<ParsedGenre>>,
    genre_pages: Mutex<HashMap<(String, u32), ParsedTitlesPage>>,
    failing_pages: Mutex<HashSet<u32>>,
    no_genre_list: AtomicBool,
    down: AtomicBool,
    calls: AtomicUsize,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_page(&self, page: u32, titles: Vec<ParsedTitleShort>, total_pages: u32) {
        self.pages.lock().unwrap().insert(
            page,
            ParsedTitlesPage {
                titles,
                total_pages,
            },
        );
    }

    pub fn set_title(&self, title: ParsedTitle) {
        self.titles
            .lock()
            .unwrap()
            .insert(title.id_on_website.clone(), title);
    }

    pub fn set_genres(&self, genres: Vec<ParsedGenre>) {
        *self.genres.lock().unwrap() = genres;
    }

    pub fn set_genre_page(&self, genre: &str, page: u32, titles: Vec<ParsedTitleShort>) {
        self.genre_pages.lock().unwrap().insert(
            (genre.to_string(), page),
            ParsedTitlesPage {
                titles,
                total_pages: 1,
            },
        );
    }

    pub fn fail_page(&self, page: u32) {
        self.failing_pages.lock().unwrap().insert(page);
    }

    /// Behaves like a website that only names genres on title pages.
    pub fn without_genre_list(&self) {
        self.no_genre_list.store(true, Ordering::SeqCst);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn begin(&self) -> Result<(), AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(AdapterError::Http("HTTP 503".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SiteAdapter for MockAdapter {
    async fn list_titles(&self, page: u32) -> Result<ParsedTitlesPage, AdapterError> {
        self.begin()?;
        if self.failing_pages.lock().unwrap().contains(&page) {
            return Err(AdapterError::Timeout);
        }
        self.pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(format!("page {page}")))
    }

    async fn get_title(&self, id_on_website: &str) -> Result<ParsedTitle, AdapterError> {
        self.begin()?;
        self.titles
            .lock()
            .unwrap()
            .get(id_on_website)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(format!("title {id_on_website}")))
    }

    fn lists_genres(&self) -> bool {
        !self.no_genre_list.load(Ordering::SeqCst)
    }

    async fn list_genres(&self) -> Result<Vec<ParsedGenre>, AdapterError> {
        self.begin()?;
        if !self.lists_genres() {
            return Err(AdapterError::Unsupported("genres"));
        }
        Ok(self.genres.lock().unwrap().clone())
    }

    async fn list_genre_titles(
        &self,
        genre_id_on_website: &str,
        page: u32,
    ) -> Result<ParsedTitlesPage, AdapterError> {
        self.begin()?;
        if !self.lists_genres() {
            return Err(AdapterError::Unsupported("genre titles"));
        }
        self.genre_pages
            .lock()
            .unwrap()
            .get(&(genre_id_on_website.to_string(), page))
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(format!("genre {genre_id_on_website}")))
    }
}

/// Metadata provider returning a fixed record for every query and a fixed
/// first page of popular ongoings.
#[derive(Default)]
pub struct MockProvider {
    pub record: Option<serde_json::Value>,
    pub popular: Vec<OngoingAnime>,
    pub failing: bool,
    pub searches: AtomicUsize,
    pub gets: AtomicUsize,
    pub popular_calls: AtomicUsize,
}

impl MockProvider {
    pub fn matching(record: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            record: Some(record),
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            failing: true,
            ..Self::default()
        })
    }

    pub fn with_popular(popular: Vec<OngoingAnime>) -> Arc<Self> {
        Arc::new(Self {
            popular,
            ..Self::default()
        })
    }

    pub fn popular_calls(&self) -> usize {
        self.popular_calls.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for MockProvider {
    async fn search(
        &self,
        _query: &str,
        _kind: Option<&str>,
    ) -> anyhow::Result<Option<serde_json::Value>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            anyhow::bail!("provider unavailable");
        }
        Ok(self.record.clone())
    }

    async fn get(&self, _id: i64) -> anyhow::Result<Option<serde_json::Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            anyhow::bail!("provider unavailable");
        }
        Ok(self.record.clone())
    }

    async fn popular_ongoings(&self, page: u32) -> anyhow::Result<Vec<OngoingAnime>> {
        self.popular_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            anyhow::bail!("provider unavailable");
        }
        Ok(if page == 1 {
            self.popular.clone()
        } else {
            Vec::new()
        })
    }
}

pub fn ongoing(shikimori_id: i64, russian: &str) -> OngoingAnime {
    OngoingAnime {
        shikimori_id,
        name: None,
        russian: Some(russian.to_string()),
        image_url: None,
    }
}

pub fn temp_db_url() -> String {
    let path = std::env::temp_dir().join(format!("anicat-test-{}.db", uuid::Uuid::new_v4()));
    format!("sqlite:{}", path.display())
}

/// Config for tests: in-memory cache, no probing, no metadata, no page delay.
pub fn test_config(db_url: &str) -> Config {
    let mut config = Config::default();
    config.general.database_path = db_url.to_string();
    config.cache.backend = CacheBackend::Memory;
    config.catalog.page_delay_ms = 0;
    config.catalog.main_pages_count = 2;
    config.probe.enabled = false;
    config.metadata.enabled = false;
    config.jobs.workers = 2;
    config.sources = vec![SourceConfig {
        titles_cache_hours: Some(2),
        ..SourceConfig::new(SourceId::Animevost)
    }];
    config
}

pub struct TestApp {
    pub state: SharedState,
    pub receiver: Option<JobReceiver>,
    pub adapter: Arc<MockAdapter>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config(&temp_db_url()), None).await
    }

    pub async fn with_config(
        config: Config,
        provider: Option<Arc<dyn MetadataProvider>>,
    ) -> Self {
        let adapter = MockAdapter::new();
        let store = Store::new(&config.general.database_path).await.unwrap();
        let adapters: Vec<(SourceConfig, Arc<dyn SiteAdapter>)> = config
            .enabled_sources()
            .into_iter()
            .map(|source| (source, adapter.clone() as Arc<dyn SiteAdapter>))
            .collect();
        let (state, receiver) = SharedState::assemble(config, store, adapters, provider).unwrap();
        Self {
            state,
            receiver: Some(receiver),
            adapter,
        }
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        self.state.registry.get(SourceId::Animevost).unwrap()
    }

    /// Starts the workers; call once.
    pub fn start_workers(&mut self) -> WorkerPool {
        let receiver = self.receiver.take().expect("workers already started");
        self.state.spawn_workers(receiver)
    }

    pub async fn drain(&self) {
        assert!(
            self.state.jobs.wait_idle(Duration::from_secs(10)).await,
            "background jobs did not finish"
        );
    }
}

pub fn short(id: &str, name: &str) -> ParsedTitleShort {
    ParsedTitleShort {
        id_on_website: id.to_string(),
        name: name.to_string(),
        en_name: None,
        image_url: Some(format!("https://img.example/{id}.jpg")),
        additional_info: Some("[1-12 из 12]".to_string()),
    }
}

pub fn detail(id: &str, name: &str) -> ParsedTitle {
    ParsedTitle {
        id_on_website: id.to_string(),
        name: name.to_string(),
        en_name: Some(format!("{name} EN")),
        image_url: Some(format!("https://img.example/{id}.jpg")),
        additional_info: None,
        description: Some("Description".to_string()),
        series_info: None,
        year: Some("2024".to_string()),
        kind: Some("ТВ".to_string()),
        duration: None,
        episodes_message: None,
        episodes_list: vec![episode(1), episode(2)],
        related_titles: Vec::new(),
        recommended_titles: Vec::new(),
        genres_names: Vec::new(),
    }
}

pub fn episode(number: i32) -> ParsedEpisode {
    ParsedEpisode {
        name: format!("{number} серия"),
        number,
        links: vec![ParsedLink {
            name: "720p".to_string(),
            link: format!("https://cdn.example/{number}.mp4"),
            quality: Some(720),
        }],
        preview: None,
        is_m3u8: false,
    }
}

pub fn genre(id: &str, name: &str) -> ParsedGenre {
    ParsedGenre {
        id_on_website: id.to_string(),
        name: name.to_string(),
    }
}
