use crate::domain::{SourceId, TitleId};
use crate::entities::{prelude::*, titles};
use crate::models::scrape::ParsedTitleShort;
use crate::models::update::TitleUpdate;
use anyhow::Result;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

pub struct TitleRepository {
    conn: DatabaseConnection,
}

impl TitleRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: TitleId) -> Result<Option<titles::Model>> {
        Ok(Titles::find_by_id(id.value()).one(&self.conn).await?)
    }

    pub async fn find_by_natural_key(
        &self,
        source: SourceId,
        id_on_website: &str,
    ) -> Result<Option<titles::Model>> {
        Ok(Titles::find()
            .filter(titles::Column::SourceId.eq(source.as_str()))
            .filter(titles::Column::IdOnWebsite.eq(id_on_website))
            .one(&self.conn)
            .await?)
    }

    /// One query for a whole scraped page.
    pub async fn find_by_natural_keys(
        &self,
        source: SourceId,
        ids_on_website: &[String],
    ) -> Result<Vec<titles::Model>> {
        if ids_on_website.is_empty() {
            return Ok(Vec::new());
        }

        Ok(Titles::find()
            .filter(titles::Column::SourceId.eq(source.as_str()))
            .filter(titles::Column::IdOnWebsite.is_in(ids_on_website.to_vec()))
            .all(&self.conn)
            .await?)
    }

    /// Inserts a minimal row for a first sighting.
    ///
    /// A concurrent insert of the same natural key is not an error: the
    /// existing row is returned instead.
    pub async fn create(&self, source: SourceId, raw: &ParsedTitleShort) -> Result<titles::Model> {
        let now = chrono::Utc::now().to_rfc3339();
        let active_model = titles::ActiveModel {
            id: Set(TitleId::generate().value()),
            source_id: Set(source.as_str().to_string()),
            id_on_website: Set(raw.id_on_website.clone()),
            name: Set(raw.name.clone()),
            en_name: Set(raw.en_name.clone()),
            image_url: Set(raw.image_url.clone()),
            description: Set(None),
            page_fetched: Set(false),
            shikimori_fetched: Set(false),
            shikimori_id: Set(None),
            created_at: Set(now.clone()),
            updated_at: Set(now),
        };

        Titles::insert(active_model)
            .on_conflict(
                OnConflict::columns([titles::Column::SourceId, titles::Column::IdOnWebsite])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await?;

        self.find_by_natural_key(source, &raw.id_on_website)
            .await?
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "title {}:{} missing after insert",
                    source,
                    raw.id_on_website
                )
            })
    }

    pub async fn apply_update(&self, id: TitleId, update: &TitleUpdate) -> Result<bool> {
        let result = Titles::update_many()
            .col_expr(titles::Column::Name, Expr::value(update.name.clone()))
            .col_expr(titles::Column::EnName, Expr::value(update.en_name.clone()))
            .col_expr(titles::Column::ImageUrl, Expr::value(update.image_url.clone()))
            .col_expr(
                titles::Column::Description,
                Expr::value(update.description.clone()),
            )
            .col_expr(titles::Column::PageFetched, Expr::value(update.page_fetched))
            .col_expr(
                titles::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(titles::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Records the outcome of a metadata lookup; `None` means "searched, no match".
    pub async fn set_shikimori_id(&self, id: TitleId, shikimori_id: Option<i64>) -> Result<()> {
        Titles::update_many()
            .col_expr(titles::Column::ShikimoriId, Expr::value(shikimori_id))
            .col_expr(titles::Column::ShikimoriFetched, Expr::value(true))
            .col_expr(
                titles::Column::UpdatedAt,
                Expr::value(chrono::Utc::now().to_rfc3339()),
            )
            .filter(titles::Column::Id.eq(id.value()))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    pub async fn find_by_shikimori_id(&self, shikimori_id: i64) -> Result<Vec<titles::Model>> {
        Ok(Titles::find()
            .filter(titles::Column::ShikimoriId.eq(shikimori_id))
            .order_by_asc(titles::Column::SourceId)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_missing_metadata(
        &self,
        source: SourceId,
        limit: u64,
    ) -> Result<Vec<titles::Model>> {
        Ok(Titles::find()
            .filter(titles::Column::SourceId.eq(source.as_str()))
            .filter(titles::Column::ShikimoriFetched.eq(false))
            .order_by_desc(titles::Column::UpdatedAt)
            .limit(limit)
            .all(&self.conn)
            .await?)
    }

    /// Titles of every source whose name or English name contains `query`.
    pub async fn search(&self, query: &str, limit: u64) -> Result<Vec<titles::Model>> {
        Ok(Titles::find()
            .filter(
                Condition::any()
                    .add(titles::Column::Name.contains(query))
                    .add(titles::Column::EnName.contains(query)),
            )
            .order_by_asc(titles::Column::Name)
            .order_by_asc(titles::Column::SourceId)
            .limit(limit)
            .all(&self.conn)
            .await?)
    }

    pub async fn count_by_source(&self, source: SourceId) -> Result<u64> {
        Ok(Titles::find()
            .filter(titles::Column::SourceId.eq(source.as_str()))
            .count(&self.conn)
            .await?)
    }
}
