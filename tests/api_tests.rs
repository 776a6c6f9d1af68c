mod common;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use anicat::domain::{SourceId, TitleId};
use common::{
    MockProvider, TestApp, detail, episode, genre, ongoing, short, temp_db_url, test_config,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn spawn_app() -> (Router, TestApp) {
    let app = TestApp::new().await;
    let state = anicat::api::create_app_state(Arc::new(app.state.clone()), None);
    (anicat::api::router(state), app)
}

async fn spawn_app_with_provider(provider: Arc<MockProvider>) -> (Router, TestApp) {
    let app = TestApp::with_config(test_config(&temp_db_url()), Some(provider)).await;
    let state = anicat::api::create_app_state(Arc::new(app.state.clone()), None);
    (anicat::api::router(state), app)
}

async fn send(router: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Method::GET, uri).await
}

#[tokio::test]
async fn lists_configured_sources() {
    let (router, _app) = spawn_app().await;

    let (status, body) = get(&router, "/api/sources").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["id"], "animevost");
    assert_eq!(body["data"][0]["name"], "AnimeVost");
    assert_eq!(body["data"][0]["titles"], 0);
    assert!(body["data"][0]["next_refresh_at"].is_null());
}

#[tokio::test]
async fn title_listing_and_detail_share_ids() {
    let (router, app) = spawn_app().await;
    app.adapter.set_page(1, vec![short("1", "Frieren")], 3);
    let mut page = detail("1", "Frieren");
    page.episodes_list = vec![episode(1)];
    app.adapter.set_title(page);

    let (status, body) = get(&router, "/api/sources/animevost/titles?page=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_pages"], 3);
    let id = body["data"]["titles"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = get(&router, &format!("/api/titles/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], id.as_str());
    assert_eq!(body["data"]["episodes"][0]["number"], 1);
    assert_eq!(body["data"]["shikimori_failed"], false);

    let (status, body) = get(&router, &format!("/api/titles/{id}/episodes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn main_page_defaults_to_configured_pages() {
    let (router, app) = spawn_app().await;
    app.adapter.set_page(1, vec![short("1", "A")], 3);
    app.adapter.set_page(2, vec![short("2", "B")], 3);

    let (status, body) = get(&router, "/api/sources/animevost/titles/main").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["titles"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pages_on_main"], 2);
}

#[tokio::test]
async fn genres_are_listed_per_source_and_grouped() {
    let (router, app) = spawn_app().await;
    app.adapter.set_genres(vec![genre("comedy", "Комедия")]);
    app.adapter
        .set_genre_page("comedy", 1, vec![short("5", "Nichijou")]);

    let (status, body) = get(&router, "/api/sources/animevost/genres").await;
    assert_eq!(status, StatusCode::OK);
    let genre_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = get(&router, "/api/genres").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "Комедия");
    assert_eq!(body["data"][0]["variants"][0]["id"], genre_id.as_str());

    let (status, body) = get(&router, &format!("/api/genres/{genre_id}/titles")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["titles"][0]["name"], "Nichijou");
}

#[tokio::test]
async fn unknown_source_is_not_found() {
    let (router, _app) = spawn_app().await;

    let (status, body) = get(&router, "/api/sources/kodik/titles").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    // Known source without a registered adapter.
    let (status, _) = get(&router, "/api/sources/anidub/genres").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_ids_and_pages_are_rejected() {
    let (router, _app) = spawn_app().await;

    let (status, _) = get(&router, "/api/titles/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&router, &format!("/api/titles/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&router, "/api/sources/animevost/titles?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unreachable_website_is_a_bad_gateway() {
    let (router, app) = spawn_app().await;
    app.adapter.set_down(true);

    let (status, body) = get(&router, "/api/sources/animevost/titles").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "AnimeVost is unavailable");
}

#[tokio::test]
async fn resolves_website_ids() {
    let (router, app) = spawn_app().await;
    app.adapter.set_title(detail("77", "Kaiba"));

    let (status, body) = get(&router, "/api/sources/animevost/resolve/77").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id_on_website"], "77");

    let (status, _) = get(&router, "/api/sources/animevost/resolve/78").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refresh_is_queued_once() {
    let (router, _app) = spawn_app().await;

    let (status, body) = send(&router, Method::POST, "/api/sources/animevost/refresh").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["queued"], true);

    let (status, body) = send(&router, Method::POST, "/api/sources/animevost/refresh").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["queued"], false);
}

#[tokio::test]
async fn cache_flush_reports_removed_entries() {
    let (router, app) = spawn_app().await;
    app.adapter.set_page(1, vec![short("1", "A")], 1);
    get(&router, "/api/sources/animevost/titles").await;

    let (status, body) = send(&router, Method::DELETE, "/api/sources/animevost/cache").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], 2);
}

#[tokio::test]
async fn health_reports_database_and_sources() {
    let (router, _app) = spawn_app().await;

    let (status, body) = get(&router, "/api/system/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["database"], true);
    assert_eq!(body["data"]["sources"][0], "animevost");
}

#[tokio::test]
async fn genres_of_a_site_without_genre_list_come_from_title_pages() {
    let (router, app) = spawn_app().await;
    app.adapter.without_genre_list();
    let mut page = detail("77", "Kaiba");
    page.genres_names = vec!["Комедия".to_string(), "Драма".to_string()];
    app.adapter.set_title(page);

    let (_, body) = get(&router, "/api/sources/animevost/resolve/77").await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = get(&router, &format!("/api/titles/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["genres"].as_array().unwrap().len(), 2);

    let (status, body) = get(&router, "/api/sources/animevost/genres").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    let genre_id = body["data"][1]["id"].as_str().unwrap().to_string();

    let (status, body) = get(&router, &format!("/api/genres/{genre_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Комедия");
    assert_eq!(body["data"]["source_id"], "animevost");
}

#[tokio::test]
async fn resolves_genre_names() {
    let (router, app) = spawn_app().await;
    app.adapter.set_genres(vec![genre("comedy", "Комедия")]);
    let (_, body) = get(&router, "/api/sources/animevost/genres").await;
    let genre_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = get(
        &router,
        "/api/sources/animevost/genres/resolve?name=%20%D0%BA%D0%BE%D0%BC%D0%B5%D0%B4%D0%B8%D1%8F%20",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], genre_id.as_str());

    let (status, body) = get(&router, "/api/sources/animevost/genres/resolve?name=comedy").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], genre_id.as_str());

    let (status, _) = get(&router, "/api/sources/animevost/genres/resolve?name=horror").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&router, "/api/sources/animevost/genres/resolve").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_genre_is_not_found() {
    let (router, _app) = spawn_app().await;

    let (status, _) = get(&router, &format!("/api/genres/{}", uuid::Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&router, "/api/genres/comedy").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn searches_titles_by_name() {
    let (router, app) = spawn_app().await;
    let mut frieren = short("1", "Frieren");
    frieren.en_name = Some("Sousou no Frieren".to_string());
    app.adapter
        .set_page(1, vec![frieren, short("2", "Dandadan")], 1);
    get(&router, "/api/sources/animevost/titles").await;

    let (status, body) = get(&router, "/api/titles/search?query=frier").await;
    assert_eq!(status, StatusCode::OK);
    let found = body["data"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "Frieren");
    assert_eq!(found[0]["source_id"], "animevost");

    let (status, body) = get(&router, "/api/titles/search?query=Kaiba").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = get(&router, "/api/titles/search?query=%20").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn popular_titles_are_linked_to_the_catalog_and_cached() {
    let provider = MockProvider::with_popular(vec![
        ongoing(52991, "Фрирен"),
        ongoing(57334, "Дандадан"),
        ongoing(1, "Нет в каталоге"),
    ]);
    let (router, app) = spawn_app_with_provider(provider.clone()).await;

    let store = &app.state.store;
    let frieren = store
        .create_title(SourceId::Animevost, &short("1", "Frieren"))
        .await
        .unwrap();
    store
        .set_title_shikimori_id(TitleId::from(frieren.id), Some(52991))
        .await
        .unwrap();
    let dandadan = store
        .create_title(SourceId::Animevost, &short("2", "Dandadan"))
        .await
        .unwrap();
    store
        .set_title_shikimori_id(TitleId::from(dandadan.id), Some(57334))
        .await
        .unwrap();

    let (status, body) = get(&router, "/api/titles/popular").await;
    assert_eq!(status, StatusCode::OK);
    let popular = body["data"].as_array().unwrap();
    assert_eq!(popular.len(), 2);
    assert_eq!(popular[0]["name"], "Фрирен");
    assert_eq!(popular[0]["shikimori_id"], 52991);
    assert_eq!(popular[0]["image_url"], "https://img.example/1.jpg");
    assert_eq!(
        popular[0]["on_other_sources"][0]["id"],
        frieren.id.to_string().as_str()
    );
    let fetched = provider.popular_calls();
    assert_eq!(fetched, 2);

    let (status, body) = get(&router, "/api/titles/popular").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(provider.popular_calls(), fetched);
}

#[tokio::test]
async fn popular_titles_need_a_metadata_provider() {
    let (router, _app) = spawn_app().await;

    let (status, body) = get(&router, "/api/titles/popular").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (router, _app) = spawn_app_with_provider(MockProvider::failing()).await;
    let (status, _) = get(&router, "/api/titles/popular").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}
