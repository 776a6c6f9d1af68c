use crate::models::scrape::{
    ParsedEpisode, ParsedGenre, ParsedLink, ParsedTitle, ParsedTitleShort, ParsedTitlesPage,
};
use crate::sources::{AdapterError, SiteAdapter};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::OnceLock;

pub const ANIMEVOST_API: &str = "https://api.animetop.info/v1";

const PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    state: Option<ApiState>,
    data: T,
}

#[derive(Debug, Deserialize)]
struct ApiState {
    #[serde(default)]
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiTitle {
    id: i64,
    title: String,
    #[serde(rename = "urlImagePreview", default)]
    image: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    year: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEpisode {
    name: String,
    #[serde(default)]
    std: Option<String>,
    #[serde(default)]
    hd: Option<String>,
    #[serde(default)]
    preview: Option<String>,
}

/// Adapter for the AnimeVost JSON API.
#[derive(Clone)]
pub struct AnimevostAdapter {
    client: Client,
    base_url: String,
}

impl AnimevostAdapter {
    #[must_use]
    pub fn with_shared_client(client: Client, base_url: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| ANIMEVOST_API.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    async fn check(response: reqwest::Response, id: &str) -> Result<reqwest::Response, AdapterError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AdapterError::NotFound(id.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Http(format!(
                "AnimeVost API error: {} - {}",
                status, body
            )));
        }
        Ok(response)
    }

    async fn fetch_info(&self, id: &str) -> Result<ApiTitle, AdapterError> {
        let url = format!("{}/info", self.base_url);
        let response = self.client.post(&url).form(&[("id", id)]).send().await?;
        let response: ApiResponse<Vec<ApiTitle>> = Self::check(response, id).await?.json().await?;

        response
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::NotFound(id.to_string()))
    }

    async fn fetch_playlist(&self, id: &str) -> Result<Vec<ApiEpisode>, AdapterError> {
        let url = format!("{}/playlist", self.base_url);
        let response = self.client.post(&url).form(&[("id", id)]).send().await?;
        Ok(Self::check(response, id).await?.json().await?)
    }
}

#[async_trait::async_trait]
impl SiteAdapter for AnimevostAdapter {
    async fn list_titles(&self, page: u32) -> Result<ParsedTitlesPage, AdapterError> {
        let url = format!(
            "{}/last?page={}&quantity={}",
            self.base_url, page, PAGE_SIZE
        );
        let response = self.client.get(&url).send().await?;
        let response: ApiResponse<Vec<ApiTitle>> =
            Self::check(response, "last").await?.json().await?;

        let total_pages = response
            .state
            .and_then(|s| s.count)
            .map_or(page, |count| count.div_ceil(PAGE_SIZE).max(page));

        let titles = response
            .data
            .into_iter()
            .map(|title| {
                let parts = split_title(&title.title);
                ParsedTitleShort {
                    id_on_website: title.id.to_string(),
                    name: parts.name,
                    en_name: parts.en_name,
                    image_url: title.image,
                    additional_info: parts.series,
                }
            })
            .collect();

        Ok(ParsedTitlesPage {
            titles,
            total_pages,
        })
    }

    async fn get_title(&self, id_on_website: &str) -> Result<ParsedTitle, AdapterError> {
        if id_on_website.is_empty() || !id_on_website.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AdapterError::NotFound(format!(
                "Title ID for animevost must be a number, got '{id_on_website}'"
            )));
        }

        let info = self.fetch_info(id_on_website).await?;
        let playlist = self.fetch_playlist(id_on_website).await?;
        let parts = split_title(&info.title);

        let mut episodes_list: Vec<ParsedEpisode> = playlist
            .into_iter()
            .enumerate()
            .map(|(index, episode)| playlist_episode(index, episode))
            .collect();
        episodes_list.sort_by_key(|e| e.number);

        let genres_names = info
            .genre
            .as_deref()
            .map(|genres| {
                genres
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(ParsedTitle {
            id_on_website: id_on_website.to_string(),
            name: parts.name,
            en_name: parts.en_name,
            image_url: info.image,
            additional_info: parts.series.clone(),
            description: info.description,
            series_info: parts.series,
            year: info.year,
            kind: info.kind,
            duration: None,
            episodes_message: None,
            episodes_list,
            related_titles: Vec::new(),
            recommended_titles: Vec::new(),
            genres_names,
        })
    }

    fn lists_genres(&self) -> bool {
        false
    }

    async fn list_genres(&self) -> Result<Vec<ParsedGenre>, AdapterError> {
        Err(AdapterError::Unsupported("genres"))
    }

    async fn list_genre_titles(
        &self,
        _genre_id_on_website: &str,
        _page: u32,
    ) -> Result<ParsedTitlesPage, AdapterError> {
        Err(AdapterError::Unsupported("genre titles"))
    }
}

fn playlist_episode(index: usize, episode: ApiEpisode) -> ParsedEpisode {
    let fallback = i32::try_from(index + 1).unwrap_or(i32::MAX);
    let number = episode_number(&episode.name).unwrap_or(fallback);

    let links = [("480p", 480, episode.std), ("720p", 720, episode.hd)]
        .into_iter()
        .filter_map(|(name, quality, link)| {
            link.filter(|l| !l.is_empty()).map(|link| ParsedLink {
                name: name.to_string(),
                link,
                quality: Some(quality),
            })
        })
        .collect();

    ParsedEpisode {
        name: episode.name,
        number,
        links,
        preview: episode.preview,
        is_m3u8: false,
    }
}

/// Pieces of an AnimeVost title string such as
/// `"Имя / English Name [1-12 из 24]"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleParts {
    pub name: String,
    pub en_name: Option<String>,
    pub series: Option<String>,
}

fn series_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\s*$").expect("Invalid regex"))
}

#[must_use]
pub fn split_title(raw: &str) -> TitleParts {
    let raw = raw.trim();
    let series = series_regex()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty());
    let without_series = series_regex().replace(raw, "");
    let without_series = without_series.trim();

    let (name, en_name) = match without_series.split_once(" /") {
        Some((name, en)) => {
            let en = en.trim().trim_end_matches('.').trim();
            (name.trim(), (!en.is_empty()).then(|| en.to_string()))
        }
        None => (without_series, None),
    };

    TitleParts {
        name: name.to_string(),
        en_name,
        series,
    }
}

/// First number in an episode label such as `"12 серия"`.
#[must_use]
pub fn episode_number(label: &str) -> Option<i32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\d+").expect("Invalid regex"));
    re.find(label)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_full_title() {
        let parts = split_title("Магическая битва / Jujutsu Kaisen. [1-24 из 24]");
        assert_eq!(parts.name, "Магическая битва");
        assert_eq!(parts.en_name.as_deref(), Some("Jujutsu Kaisen"));
        assert_eq!(parts.series.as_deref(), Some("1-24 из 24"));
    }

    #[test]
    fn splits_title_without_english_name() {
        let parts = split_title("Наруто [220 из 220]");
        assert_eq!(parts.name, "Наруто");
        assert_eq!(parts.en_name, None);
        assert_eq!(parts.series.as_deref(), Some("220 из 220"));

        let bare = split_title("Фильм");
        assert_eq!(bare.name, "Фильм");
        assert_eq!(bare.series, None);
    }

    #[test]
    fn parses_episode_numbers() {
        assert_eq!(episode_number("12 серия"), Some(12));
        assert_eq!(episode_number("Серия 3"), Some(3));
        assert_eq!(episode_number("OVA"), None);
    }

    #[test]
    fn playlist_links_carry_quality() {
        let episode = playlist_episode(
            0,
            ApiEpisode {
                name: "OVA".to_string(),
                std: Some("https://cdn.example/480.mp4".to_string()),
                hd: Some(String::new()),
                preview: None,
            },
        );
        assert_eq!(episode.number, 1);
        assert_eq!(episode.links.len(), 1);
        assert_eq!(episode.preferred_link().unwrap().quality, Some(480));
    }

    #[test]
    fn decodes_listing_payload() {
        let json = r#"{
            "state": {"status": "ok", "page": 1, "count": 45, "quantity": 20},
            "data": [{"id": 3120, "title": "Имя / Name [1 из 12]", "urlImagePreview": "https://img.example/1.jpg"}]
        }"#;
        let response: ApiResponse<Vec<ApiTitle>> = serde_json::from_str(json).unwrap();
        assert_eq!(response.state.unwrap().count, Some(45));
        assert_eq!(response.data[0].id, 3120);
    }
}
