use crate::domain::{EpisodeId, GenreId, SourceId, TitleId};
use crate::models::scrape::{ParsedEpisode, ParsedGenre, ParsedTitleShort};
use crate::models::update::TitleUpdate;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::{cache_entries, episodes, genres, source_schedules, titles};

pub mod migrator;
pub mod repositories;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let path_str = db_url.trim_start_matches("sqlite:").trim_start_matches("//");
        let in_memory = path_str.starts_with(":memory:") || path_str.contains("mode=memory");
        if !in_memory {
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn title_repo(&self) -> repositories::title::TitleRepository {
        repositories::title::TitleRepository::new(self.conn.clone())
    }

    fn genre_repo(&self) -> repositories::genre::GenreRepository {
        repositories::genre::GenreRepository::new(self.conn.clone())
    }

    fn episode_repo(&self) -> repositories::episode::EpisodeRepository {
        repositories::episode::EpisodeRepository::new(self.conn.clone())
    }

    fn cache_repo(&self) -> repositories::cache::CacheRepository {
        repositories::cache::CacheRepository::new(self.conn.clone())
    }

    fn schedule_repo(&self) -> repositories::schedule::ScheduleRepository {
        repositories::schedule::ScheduleRepository::new(self.conn.clone())
    }

    // Titles

    pub async fn get_title(&self, id: TitleId) -> Result<Option<titles::Model>> {
        self.title_repo().get(id).await
    }

    pub async fn find_title_by_natural_key(
        &self,
        source: SourceId,
        id_on_website: &str,
    ) -> Result<Option<titles::Model>> {
        self.title_repo()
            .find_by_natural_key(source, id_on_website)
            .await
    }

    pub async fn find_titles_by_natural_keys(
        &self,
        source: SourceId,
        ids_on_website: &[String],
    ) -> Result<Vec<titles::Model>> {
        self.title_repo()
            .find_by_natural_keys(source, ids_on_website)
            .await
    }

    pub async fn create_title(
        &self,
        source: SourceId,
        raw: &ParsedTitleShort,
    ) -> Result<titles::Model> {
        self.title_repo().create(source, raw).await
    }

    pub async fn apply_title_update(&self, id: TitleId, update: &TitleUpdate) -> Result<bool> {
        self.title_repo().apply_update(id, update).await
    }

    pub async fn set_title_shikimori_id(
        &self,
        id: TitleId,
        shikimori_id: Option<i64>,
    ) -> Result<()> {
        self.title_repo().set_shikimori_id(id, shikimori_id).await
    }

    pub async fn find_titles_by_shikimori_id(&self, shikimori_id: i64) -> Result<Vec<titles::Model>> {
        self.title_repo().find_by_shikimori_id(shikimori_id).await
    }

    pub async fn list_titles_missing_metadata(
        &self,
        source: SourceId,
        limit: u64,
    ) -> Result<Vec<titles::Model>> {
        self.title_repo().list_missing_metadata(source, limit).await
    }

    pub async fn search_titles(&self, query: &str, limit: u64) -> Result<Vec<titles::Model>> {
        self.title_repo().search(query, limit).await
    }

    pub async fn count_titles(&self, source: SourceId) -> Result<u64> {
        self.title_repo().count_by_source(source).await
    }

    // Genres

    pub async fn get_genre(&self, id: GenreId) -> Result<Option<genres::Model>> {
        self.genre_repo().get(id).await
    }

    pub async fn list_genres(&self, source: SourceId) -> Result<Vec<genres::Model>> {
        self.genre_repo().list_by_source(source).await
    }

    pub async fn find_genres_by_natural_keys(
        &self,
        source: SourceId,
        ids_on_website: &[String],
    ) -> Result<Vec<genres::Model>> {
        self.genre_repo()
            .find_by_natural_keys(source, ids_on_website)
            .await
    }

    pub async fn create_genre(&self, source: SourceId, raw: &ParsedGenre) -> Result<genres::Model> {
        self.genre_repo().create(source, raw).await
    }

    pub async fn rename_genre(&self, id: GenreId, name: &str) -> Result<()> {
        self.genre_repo().rename(id, name).await
    }

    pub async fn genres_for_title(&self, title_id: TitleId) -> Result<Vec<genres::Model>> {
        self.genre_repo().genres_for_title(title_id).await
    }

    pub async fn list_genre_titles(
        &self,
        genre_id: GenreId,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<titles::Model>, u64)> {
        self.genre_repo()
            .titles_for_genre(genre_id, page, page_size)
            .await
    }

    pub async fn link_title_genres(&self, title_id: TitleId, genre_ids: &[GenreId]) -> Result<()> {
        self.genre_repo().link_title(title_id, genre_ids).await
    }

    /// Every persisted genre grouped by display name, across sources.
    pub async fn unique_genres(&self) -> Result<Vec<(String, Vec<genres::Model>)>> {
        let mut grouped: BTreeMap<String, Vec<genres::Model>> = BTreeMap::new();
        for genre in self.genre_repo().list_all().await? {
            grouped.entry(genre.name.clone()).or_default().push(genre);
        }
        Ok(grouped.into_iter().collect())
    }

    // Episodes

    pub async fn get_episode(&self, id: EpisodeId) -> Result<Option<episodes::Model>> {
        self.episode_repo().get(id).await
    }

    pub async fn list_episodes(&self, title_id: TitleId) -> Result<Vec<episodes::Model>> {
        self.episode_repo().list_for_title(title_id).await
    }

    pub async fn create_missing_episodes(
        &self,
        title_id: TitleId,
        episodes: &[&ParsedEpisode],
    ) -> Result<()> {
        self.episode_repo().create_missing(title_id, episodes).await
    }

    pub async fn set_episode_duration(&self, id: EpisodeId, seconds: i32) -> Result<()> {
        self.episode_repo().set_duration(id, seconds).await
    }

    // Cache entries

    pub async fn get_cache_entry(&self, key: &str) -> Result<Option<cache_entries::Model>> {
        self.cache_repo().get(key).await
    }

    pub async fn set_cache_entry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl_millis: Option<i64>,
    ) -> Result<()> {
        self.cache_repo().set(key, value, ttl_millis).await
    }

    pub async fn delete_cache_prefix(&self, prefix: &str) -> Result<u64> {
        self.cache_repo().delete_prefix(prefix).await
    }

    pub async fn purge_expired_cache(&self) -> Result<u64> {
        self.cache_repo().purge_expired().await
    }

    // Schedules

    pub async fn get_schedule(&self, source: SourceId) -> Result<Option<source_schedules::Model>> {
        self.schedule_repo().get(source).await
    }

    pub async fn next_due_at(&self, source: SourceId) -> Result<Option<DateTime<Utc>>> {
        self.schedule_repo().next_due_at(source).await
    }

    pub async fn record_source_run(
        &self,
        source: SourceId,
        next_due_at: DateTime<Utc>,
        last_run_at: DateTime<Utc>,
        last_error: Option<String>,
    ) -> Result<()> {
        self.schedule_repo()
            .record_run(source, next_due_at, last_run_at, last_error)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Store {
        let path = std::env::temp_dir().join(format!("anicat-store-{}.db", uuid::Uuid::new_v4()));
        Store::new(&format!("sqlite:{}", path.display())).await.unwrap()
    }

    fn short(id: &str, name: &str) -> ParsedTitleShort {
        ParsedTitleShort {
            id_on_website: id.to_string(),
            name: name.to_string(),
            en_name: None,
            image_url: Some(format!("https://img.example/{id}.jpg")),
            additional_info: None,
        }
    }

    #[tokio::test]
    async fn create_title_is_idempotent_per_natural_key() {
        let store = test_store().await;

        let first = store
            .create_title(SourceId::Animevost, &short("1", "First"))
            .await
            .unwrap();
        let again = store
            .create_title(SourceId::Animevost, &short("1", "Renamed"))
            .await
            .unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.name, "First");
        assert!(!again.page_fetched);

        // Same website id on another source is a different title.
        let other = store
            .create_title(SourceId::Anidub, &short("1", "First"))
            .await
            .unwrap();
        assert_ne!(first.id, other.id);
        assert_eq!(store.count_titles(SourceId::Animevost).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn batch_lookup_returns_only_known_keys() {
        let store = test_store().await;
        store
            .create_title(SourceId::Animevost, &short("1", "One"))
            .await
            .unwrap();
        store
            .create_title(SourceId::Animevost, &short("2", "Two"))
            .await
            .unwrap();

        let found = store
            .find_titles_by_natural_keys(
                SourceId::Animevost,
                &["1".to_string(), "2".to_string(), "3".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn cache_entries_expire() {
        let store = test_store().await;
        store
            .set_cache_entry("k:live", b"v".to_vec(), Some(60_000))
            .await
            .unwrap();
        store
            .set_cache_entry("k:dead", b"v".to_vec(), Some(-1))
            .await
            .unwrap();
        store
            .set_cache_entry("other", b"v".to_vec(), None)
            .await
            .unwrap();

        assert!(store.get_cache_entry("k:live").await.unwrap().is_some());
        assert!(store.get_cache_entry("k:dead").await.unwrap().is_none());
        assert_eq!(store.delete_cache_prefix("k:").await.unwrap(), 1);
        assert!(store.get_cache_entry("other").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn schedule_round_trip() {
        let store = test_store().await;
        assert!(store.next_due_at(SourceId::Animevost).await.unwrap().is_none());

        let now = Utc::now();
        let due = now + chrono::Duration::hours(6);
        store
            .record_source_run(SourceId::Animevost, due, now, None)
            .await
            .unwrap();

        let stored = store.next_due_at(SourceId::Animevost).await.unwrap().unwrap();
        assert_eq!(stored.timestamp(), due.timestamp());
    }
}
