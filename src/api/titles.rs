use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, EpisodeDto, SearchQuery};
use crate::domain::{SourceId, TitleId};
use crate::entities::titles;
use crate::models::catalog::{PopularTitle, TitleDetail, TitleShort};

const SEARCH_LIMIT: u64 = 30;
const POPULAR_LIMIT: usize = 10;

async fn find_title(state: &AppState, id: &str) -> Result<titles::Model, ApiError> {
    let title_id: TitleId = id
        .parse()
        .map_err(|_| ApiError::validation(format!("Invalid title id '{id}'")))?;

    state
        .store()
        .get_title(title_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Title", title_id))
}

/// `GET /api/titles/{id}`
pub async fn get_title(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TitleDetail>>, ApiError> {
    let row = find_title(&state, &id).await?;
    let orchestrator = state.registry().resolve(&row.source_id)?;
    let detail = orchestrator.get_title(&row).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// `GET /api/titles/{id}/episodes`
///
/// Episodes known to the database, with probed durations. Links are only
/// part of the full title response.
pub async fn list_episodes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<EpisodeDto>>>, ApiError> {
    let row = find_title(&state, &id).await?;
    let episodes = state
        .store()
        .list_episodes(row.id.into())
        .await?
        .into_iter()
        .map(EpisodeDto::from)
        .collect();
    Ok(Json(ApiResponse::success(episodes)))
}

/// `GET /api/titles/search?query=`
pub async fn search_titles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<Vec<TitleShort>>>, ApiError> {
    let query = query.query.trim();
    if query.is_empty() {
        return Err(ApiError::validation("Search query cannot be empty"));
    }

    let titles = state
        .store()
        .search_titles(query, SEARCH_LIMIT)
        .await?
        .iter()
        .filter_map(|row| {
            let source = row.source_id.parse::<SourceId>().ok()?;
            Some(TitleShort::from_row(source, row))
        })
        .collect();
    Ok(Json(ApiResponse::success(titles)))
}

/// `GET /api/titles/popular`
///
/// Popular ongoing anime from the metadata provider that the catalog carries.
pub async fn popular_titles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<PopularTitle>>>, ApiError> {
    let titles = state
        .shared
        .metadata
        .popular_titles(POPULAR_LIMIT)
        .await
        .map_err(|e| ApiError::ExternalApiError {
            service: "Shikimori".to_string(),
            message: e.to_string(),
        })?;
    Ok(Json(ApiResponse::success(titles)))
}
