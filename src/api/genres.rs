use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, PageQuery};
use crate::domain::{GenreId, SourceId};
use crate::entities::genres;
use crate::models::catalog::{Genre, TitlesPage, UniqueGenre};

/// `GET /api/genres`
///
/// Genres of all sources grouped by name.
pub async fn list_genres(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<UniqueGenre>>>, ApiError> {
    let genres = state
        .store()
        .unique_genres()
        .await?
        .into_iter()
        .map(|(name, rows)| UniqueGenre {
            name,
            variants: rows
                .iter()
                .filter_map(|row| {
                    let source = row.source_id.parse::<SourceId>().ok()?;
                    Some(Genre::from_row(source, row))
                })
                .collect(),
        })
        .filter(|genre| !genre.variants.is_empty())
        .collect();

    Ok(Json(ApiResponse::success(genres)))
}

async fn find_genre(state: &AppState, id: &str) -> Result<genres::Model, ApiError> {
    let genre_id: GenreId = id
        .parse()
        .map_err(|_| ApiError::validation(format!("Invalid genre id '{id}'")))?;

    state
        .store()
        .get_genre(genre_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Genre", genre_id))
}

/// `GET /api/genres/{id}`
pub async fn get_genre(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Genre>>, ApiError> {
    let genre = find_genre(&state, &id).await?;
    let source: SourceId = genre
        .source_id
        .parse()
        .map_err(|_| ApiError::not_found("Genre", &id))?;
    Ok(Json(ApiResponse::success(Genre::from_row(source, &genre))))
}

/// `GET /api/genres/{id}/titles?page=`
pub async fn get_genre_titles(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<TitlesPage>>, ApiError> {
    let genre = find_genre(&state, &id).await?;
    let orchestrator = state.registry().resolve(&genre.source_id)?;
    let page = orchestrator.get_genre(&genre, query.page).await?;
    Ok(Json(ApiResponse::success(page)))
}
