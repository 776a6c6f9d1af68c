use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, CacheFlushed, GenreNameQuery, PageQuery, RefreshQueued,
    SourceDto,
};
use crate::jobs::Job;
use crate::models::catalog::{Genre, MainPage, TitleShort, TitlesPage};

/// `GET /api/sources`
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<SourceDto>>>, ApiError> {
    let store = state.store();
    let mut sources = Vec::new();

    for id in state.registry().ids() {
        let schedule = store.get_schedule(id).await?;
        sources.push(SourceDto {
            id,
            name: id.display_name(),
            titles: store.count_titles(id).await?,
            next_refresh_at: schedule.as_ref().map(|s| s.next_due_at.clone()),
            last_refresh_at: schedule.as_ref().and_then(|s| s.last_run_at.clone()),
            last_error: schedule.and_then(|s| s.last_error),
        });
    }

    Ok(Json(ApiResponse::success(sources)))
}

/// `GET /api/sources/{source}/titles?page=`
pub async fn get_titles(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<TitlesPage>>, ApiError> {
    let orchestrator = state.registry().resolve(&source)?;
    let page = orchestrator.get_titles(query.page).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// `GET /api/sources/{source}/titles/main`
pub async fn get_main_titles(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<ApiResponse<MainPage>>, ApiError> {
    let orchestrator = state.registry().resolve(&source)?;
    let page = orchestrator.get_main_titles().await?;
    Ok(Json(ApiResponse::success(page)))
}

/// `GET /api/sources/{source}/genres`
pub async fn get_genres(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<ApiResponse<Vec<Genre>>>, ApiError> {
    let orchestrator = state.registry().resolve(&source)?;
    let genres = orchestrator.get_genres().await?;
    Ok(Json(ApiResponse::success(genres)))
}

/// `GET /api/sources/{source}/resolve/{id_on_website}`
///
/// Maps a website id, e.g. from an old bookmark, to a catalog title.
pub async fn resolve_title(
    State(state): State<Arc<AppState>>,
    Path((source, id_on_website)): Path<(String, String)>,
) -> Result<Json<ApiResponse<TitleShort>>, ApiError> {
    let orchestrator = state.registry().resolve(&source)?;
    let title = orchestrator.resolve_external_title(&id_on_website).await?;
    Ok(Json(ApiResponse::success(title)))
}

/// `GET /api/sources/{source}/genres/resolve?name=`
///
/// Maps a genre as the website names it to a catalog genre.
pub async fn resolve_genre(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
    Query(query): Query<GenreNameQuery>,
) -> Result<Json<ApiResponse<Genre>>, ApiError> {
    let orchestrator = state.registry().resolve(&source)?;
    let genre = orchestrator.resolve_genre_name(&query.name).await?;
    Ok(Json(ApiResponse::success(genre)))
}

/// `POST /api/sources/{source}/refresh`
pub async fn refresh_source(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<RefreshQueued>>), ApiError> {
    let source = state.registry().resolve(&source)?.source();
    let queued = state.shared.jobs.enqueue(Job::FullRefresh { source });
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(RefreshQueued { source, queued })),
    ))
}

/// `DELETE /api/sources/{source}/cache`
pub async fn flush_cache(
    State(state): State<Arc<AppState>>,
    Path(source): Path<String>,
) -> Result<Json<ApiResponse<CacheFlushed>>, ApiError> {
    let orchestrator = state.registry().resolve(&source)?;
    let removed = orchestrator.flush_cache().await?;
    Ok(Json(ApiResponse::success(CacheFlushed {
        source: orchestrator.source(),
        removed,
    })))
}
