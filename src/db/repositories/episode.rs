use crate::domain::{EpisodeId, TitleId};
use crate::entities::{episodes, prelude::*};
use crate::models::scrape::ParsedEpisode;
use anyhow::Result;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};

pub struct EpisodeRepository {
    conn: DatabaseConnection,
}

impl EpisodeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: EpisodeId) -> Result<Option<episodes::Model>> {
        Ok(Episodes::find_by_id(id.value()).one(&self.conn).await?)
    }

    pub async fn list_for_title(&self, title_id: TitleId) -> Result<Vec<episodes::Model>> {
        Ok(Episodes::find()
            .filter(episodes::Column::TitleId.eq(title_id.value()))
            .order_by_asc(episodes::Column::Number)
            .all(&self.conn)
            .await?)
    }

    /// Inserts rows for episodes not seen before, keyed by `(title, number)`.
    pub async fn create_missing(&self, title_id: TitleId, episodes: &[&ParsedEpisode]) -> Result<()> {
        if episodes.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().to_rfc3339();
        let active_models: Vec<episodes::ActiveModel> = episodes
            .iter()
            .map(|episode| episodes::ActiveModel {
                id: Set(EpisodeId::generate().value()),
                title_id: Set(title_id.value()),
                number: Set(episode.number),
                name: Set(episode.name.clone()),
                duration: Set(None),
                duration_fetched: Set(false),
                is_m3u8: Set(episode.is_m3u8),
                created_at: Set(now.clone()),
            })
            .collect();

        Episodes::insert_many(active_models)
            .on_conflict(
                OnConflict::columns([episodes::Column::TitleId, episodes::Column::Number])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(())
    }

    pub async fn set_duration(&self, id: EpisodeId, seconds: i32) -> Result<()> {
        Episodes::update_many()
            .col_expr(episodes::Column::Duration, Expr::value(Some(seconds)))
            .col_expr(episodes::Column::DurationFetched, Expr::value(true))
            .filter(episodes::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}
