use crate::entities::{cache_entries, prelude::*};
use anyhow::Result;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

pub struct CacheRepository {
    conn: DatabaseConnection,
}

impl CacheRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    fn now_millis() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Returns a live entry. An expired entry is purged on the way out.
    pub async fn get(&self, key: &str) -> Result<Option<cache_entries::Model>> {
        let entry = CacheEntries::find_by_id(key.to_string())
            .one(&self.conn)
            .await?;

        match entry {
            Some(e) if e.expires_at.is_some_and(|at| at <= Self::now_millis()) => {
                let _ = CacheEntries::delete_by_id(key.to_string())
                    .exec(&self.conn)
                    .await;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    pub async fn set(&self, key: &str, value: Vec<u8>, ttl_millis: Option<i64>) -> Result<()> {
        let active_model = cache_entries::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            expires_at: Set(ttl_millis.map(|ttl| Self::now_millis() + ttl)),
        };

        CacheEntries::insert(active_model)
            .on_conflict(
                OnConflict::column(cache_entries::Column::Key)
                    .update_columns([
                        cache_entries::Column::Value,
                        cache_entries::Column::ExpiresAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(())
    }

    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let result = CacheEntries::delete_many()
            .filter(cache_entries::Column::Key.starts_with(prefix))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let result = CacheEntries::delete_many()
            .filter(cache_entries::Column::ExpiresAt.lte(Self::now_millis()))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}
