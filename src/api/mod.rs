use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::SourceRegistry;
use crate::state::SharedState;

mod error;
mod genres;
mod observability;
mod sources;
mod system;
mod titles;
mod types;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn registry(&self) -> &SourceRegistry {
        &self.shared.registry
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config().server.cors_allowed_origins.clone();

    let api_router = Router::new()
        .route("/sources", get(sources::list_sources))
        .route("/sources/{source}/titles", get(sources::get_titles))
        .route("/sources/{source}/titles/main", get(sources::get_main_titles))
        .route("/sources/{source}/genres", get(sources::get_genres))
        .route("/sources/{source}/genres/resolve", get(sources::resolve_genre))
        .route(
            "/sources/{source}/resolve/{id_on_website}",
            get(sources::resolve_title),
        )
        .route("/sources/{source}/refresh", post(sources::refresh_source))
        .route("/sources/{source}/cache", delete(sources::flush_cache))
        .route("/titles/search", get(titles::search_titles))
        .route("/titles/popular", get(titles::popular_titles))
        .route("/titles/{id}", get(titles::get_title))
        .route("/titles/{id}/episodes", get(titles::list_episodes))
        .route("/genres", get(genres::list_genres))
        .route("/genres/{id}", get(genres::get_genre))
        .route("/genres/{id}/titles", get(genres::get_genre_titles))
        .route("/system/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::track_metrics))
}
