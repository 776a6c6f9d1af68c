use crate::models::catalog::OngoingAnime;
use crate::services::metadata::MetadataProvider;
use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

pub const SHIKIMORI_API: &str = "https://shikimori.one/api";

/// Entry of the `/animes` list endpoint.
#[derive(Debug, Deserialize)]
struct AnimeListEntry {
    id: i64,
    name: Option<String>,
    russian: Option<String>,
    image: Option<AnimeImage>,
}

#[derive(Debug, Deserialize)]
struct AnimeImage {
    original: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Image paths are relative to the site root.
fn ongoing_from_entry(base_url: &str, entry: AnimeListEntry) -> OngoingAnime {
    let image_url = non_empty(entry.image.and_then(|image| image.original)).and_then(|path| {
        Url::parse(base_url)
            .and_then(|base| base.join(&path))
            .map(String::from)
            .ok()
    });

    OngoingAnime {
        shikimori_id: entry.id,
        name: non_empty(entry.name),
        russian: non_empty(entry.russian),
        image_url,
    }
}

#[derive(Clone)]
pub struct ShikimoriClient {
    client: Client,
    base_url: String,
}

impl ShikimoriClient {
    #[must_use]
    pub fn with_shared_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn search_anime(&self, query: &str, kind: Option<&str>) -> Result<Vec<Value>> {
        let mut params = vec![("search", query), ("limit", "5")];
        if let Some(kind) = kind {
            params.push(("kind", kind));
        }
        let url = url::Url::parse_with_params(&format!("{}/animes", self.base_url), &params)?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Shikimori API error: {} - {}", status, body));
        }

        Ok(response.json().await?)
    }

    pub async fn list_popular_ongoings(&self, page: u32) -> Result<Vec<OngoingAnime>> {
        let page = page.to_string();
        let params = [
            ("status", "ongoing"),
            ("order", "popularity"),
            ("limit", "50"),
            ("page", page.as_str()),
        ];
        let url = Url::parse_with_params(&format!("{}/animes", self.base_url), &params)?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Shikimori API error: {} - {}", status, body));
        }

        let entries: Vec<AnimeListEntry> = response.json().await?;
        Ok(entries
            .into_iter()
            .map(|entry| ongoing_from_entry(&self.base_url, entry))
            .collect())
    }

    pub async fn get_anime(&self, id: i64) -> Result<Option<Value>> {
        let url = format!("{}/animes/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Shikimori API error: {} - {}", status, body));
        }

        Ok(Some(response.json().await?))
    }
}

#[async_trait::async_trait]
impl MetadataProvider for ShikimoriClient {
    async fn search(&self, query: &str, kind: Option<&str>) -> Result<Option<Value>> {
        let results = self.search_anime(query, kind).await?;
        Ok(results.into_iter().next())
    }

    async fn get(&self, id: i64) -> Result<Option<Value>> {
        self.get_anime(id).await
    }

    async fn popular_ongoings(&self, page: u32) -> Result<Vec<OngoingAnime>> {
        self.list_popular_ongoings(page).await
    }
}
