use crate::domain::{GenreId, SourceId, TitleId};
use crate::entities::{genres, prelude::*, title_genres, titles};
use crate::models::scrape::ParsedGenre;
use anyhow::Result;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};

pub struct GenreRepository {
    conn: DatabaseConnection,
}

impl GenreRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: GenreId) -> Result<Option<genres::Model>> {
        Ok(Genres::find_by_id(id.value()).one(&self.conn).await?)
    }

    pub async fn list_by_source(&self, source: SourceId) -> Result<Vec<genres::Model>> {
        Ok(Genres::find()
            .filter(genres::Column::SourceId.eq(source.as_str()))
            .order_by_asc(genres::Column::Name)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_all(&self) -> Result<Vec<genres::Model>> {
        Ok(Genres::find()
            .order_by_asc(genres::Column::Name)
            .order_by_asc(genres::Column::SourceId)
            .all(&self.conn)
            .await?)
    }

    pub async fn find_by_natural_keys(
        &self,
        source: SourceId,
        ids_on_website: &[String],
    ) -> Result<Vec<genres::Model>> {
        if ids_on_website.is_empty() {
            return Ok(Vec::new());
        }

        Ok(Genres::find()
            .filter(genres::Column::SourceId.eq(source.as_str()))
            .filter(genres::Column::IdOnWebsite.is_in(ids_on_website.to_vec()))
            .all(&self.conn)
            .await?)
    }

    pub async fn create(&self, source: SourceId, raw: &ParsedGenre) -> Result<genres::Model> {
        let active_model = genres::ActiveModel {
            id: Set(GenreId::generate().value()),
            source_id: Set(source.as_str().to_string()),
            id_on_website: Set(raw.id_on_website.clone()),
            name: Set(raw.name.clone()),
        };

        Genres::insert(active_model)
            .on_conflict(
                OnConflict::columns([genres::Column::SourceId, genres::Column::IdOnWebsite])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Genres::find()
            .filter(genres::Column::SourceId.eq(source.as_str()))
            .filter(genres::Column::IdOnWebsite.eq(raw.id_on_website.as_str()))
            .one(&self.conn)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!("genre {}:{} missing after insert", source, raw.id_on_website)
            })
    }

    pub async fn rename(&self, id: GenreId, name: &str) -> Result<()> {
        Genres::update_many()
            .col_expr(genres::Column::Name, Expr::value(name))
            .filter(genres::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn genres_for_title(&self, title_id: TitleId) -> Result<Vec<genres::Model>> {
        let links = TitleGenres::find()
            .filter(title_genres::Column::TitleId.eq(title_id.value()))
            .all(&self.conn)
            .await?;

        if links.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<_> = links.into_iter().map(|link| link.genre_id).collect();
        Ok(Genres::find()
            .filter(genres::Column::Id.is_in(ids))
            .order_by_asc(genres::Column::Name)
            .all(&self.conn)
            .await?)
    }

    /// One page (1-based) of the titles linked to `genre_id`, ordered by name,
    /// and the number of pages.
    pub async fn titles_for_genre(
        &self,
        genre_id: GenreId,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<titles::Model>, u64)> {
        let title_ids: Vec<_> = TitleGenres::find()
            .filter(title_genres::Column::GenreId.eq(genre_id.value()))
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|link| link.title_id)
            .collect();

        if title_ids.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let paginator = Titles::find()
            .filter(titles::Column::Id.is_in(title_ids))
            .order_by_asc(titles::Column::Name)
            .paginate(&self.conn, page_size.max(1));
        let total_pages = paginator.num_pages().await?;
        let rows = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((rows, total_pages))
    }

    /// Adds missing title↔genre links. Existing links are left alone.
    pub async fn link_title(&self, title_id: TitleId, genre_ids: &[GenreId]) -> Result<()> {
        if genre_ids.is_empty() {
            return Ok(());
        }

        let active_models: Vec<title_genres::ActiveModel> = genre_ids
            .iter()
            .map(|genre_id| title_genres::ActiveModel {
                title_id: Set(title_id.value()),
                genre_id: Set(genre_id.value()),
            })
            .collect();

        TitleGenres::insert_many(active_models)
            .on_conflict(
                OnConflict::columns([
                    title_genres::Column::TitleId,
                    title_genres::Column::GenreId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        Ok(())
    }
}
