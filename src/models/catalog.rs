use crate::domain::{EpisodeId, GenreId, SourceId, TitleId};
use crate::entities::{genres, titles};
use crate::models::scrape::{ParsedLink, ParsedTitleShort};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing entry: persisted identity overlaid with transient scrape fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleShort {
    pub id: TitleId,
    pub source_id: SourceId,
    pub id_on_website: String,
    pub name: String,
    pub en_name: Option<String>,
    pub image_url: Option<String>,
    pub additional_info: Option<String>,
}

impl TitleShort {
    /// `id`, `name` and `image_url` come from the row; the rest from the scrape.
    #[must_use]
    pub fn merge(source: SourceId, row: &titles::Model, raw: &ParsedTitleShort) -> Self {
        Self {
            id: row.id.into(),
            source_id: source,
            id_on_website: row.id_on_website.clone(),
            name: row.name.clone(),
            en_name: raw.en_name.clone(),
            image_url: row.image_url.clone(),
            additional_info: raw.additional_info.clone(),
        }
    }

    /// Entry built from the row alone, for titles without a recent scrape.
    #[must_use]
    pub fn from_row(source: SourceId, row: &titles::Model) -> Self {
        Self {
            id: row.id.into(),
            source_id: source,
            id_on_website: row.id_on_website.clone(),
            name: row.name.clone(),
            en_name: row.en_name.clone(),
            image_url: row.image_url.clone(),
            additional_info: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitlesPage {
    pub titles: Vec<TitleShort>,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainPage {
    pub titles: Vec<TitleShort>,
    pub total_pages: u32,
    pub pages_on_main: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: GenreId,
    pub source_id: SourceId,
    pub name: String,
}

impl Genre {
    #[must_use]
    pub fn from_row(source: SourceId, row: &genres::Model) -> Self {
        Self {
            id: row.id.into(),
            source_id: source,
            name: row.name.clone(),
        }
    }
}

/// Genres of every source grouped by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueGenre {
    pub name: String,
    pub variants: Vec<Genre>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,
    pub number: i32,
    pub name: String,
    pub is_m3u8: bool,
    pub image_url: Option<String>,
    /// Seconds, once probed.
    pub duration: Option<i32>,
    pub duration_label: Option<String>,
    pub links: Vec<ParsedLink>,
}

impl Episode {
    #[must_use]
    pub fn duration_label(seconds: Option<i32>) -> Option<String> {
        seconds.map(|secs| format!("{} min", (secs + 30) / 60))
    }
}

/// Same title on another source, linked through the metadata id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleLink {
    pub id: TitleId,
    pub source_id: SourceId,
    pub name: String,
    pub en_name: Option<String>,
}

impl TitleLink {
    /// `None` for rows of sources this build does not know.
    #[must_use]
    pub fn from_row(row: &titles::Model) -> Option<Self> {
        Some(Self {
            id: row.id.into(),
            source_id: row.source_id.parse().ok()?,
            name: row.name.clone(),
            en_name: row.en_name.clone(),
        })
    }
}

/// Entry of the metadata provider's popular ongoing list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OngoingAnime {
    pub shikimori_id: i64,
    pub name: Option<String>,
    pub russian: Option<String>,
    pub image_url: Option<String>,
}

/// Popular ongoing anime available on at least one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularTitle {
    pub shikimori_id: i64,
    pub name: String,
    pub en_name: Option<String>,
    pub image_url: Option<String>,
    pub on_other_sources: Vec<TitleLink>,
}

impl PopularTitle {
    /// Provider fields win; the first linked row fills the gaps. `None`
    /// when no linked row is usable.
    #[must_use]
    pub fn link(ongoing: OngoingAnime, linked: &[titles::Model]) -> Option<Self> {
        let on_other_sources: Vec<TitleLink> =
            linked.iter().filter_map(TitleLink::from_row).collect();
        let first = linked.first()?;
        if on_other_sources.is_empty() {
            return None;
        }

        Some(Self {
            shikimori_id: ongoing.shikimori_id,
            name: ongoing.russian.unwrap_or_else(|| first.name.clone()),
            en_name: ongoing.name.or_else(|| first.en_name.clone()),
            image_url: ongoing.image_url.or_else(|| first.image_url.clone()),
            on_other_sources,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    pub last_fetch: DateTime<Utc>,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleDetail {
    #[serde(flatten)]
    pub title: TitleShort,
    pub description: Option<String>,
    pub series_info: Option<String>,
    pub year: Option<String>,
    pub kind: Option<String>,
    pub duration: Option<String>,
    pub episodes_message: Option<String>,
    pub genres: Vec<Genre>,
    pub episodes: Vec<Episode>,
    pub related: Vec<TitleShort>,
    pub recommended: Vec<TitleShort>,
    pub shikimori: Option<MetadataSnapshot>,
    pub shikimori_failed: bool,
    pub on_other_sources: Vec<TitleLink>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(source: &str, name: &str) -> titles::Model {
        titles::Model {
            id: uuid::Uuid::new_v4(),
            source_id: source.to_string(),
            id_on_website: "1".to_string(),
            name: name.to_string(),
            en_name: Some("Frieren".to_string()),
            image_url: Some("https://img.example/1.jpg".to_string()),
            description: None,
            page_fetched: true,
            shikimori_fetched: true,
            shikimori_id: Some(52991),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn popular_title_prefers_provider_fields() {
        let ongoing = OngoingAnime {
            shikimori_id: 52991,
            name: None,
            russian: Some("Провожающая в последний путь Фрирен".to_string()),
            image_url: None,
        };
        let linked = [row("animevost", "Фрирен"), row("kodik", "Фрирен")];

        let popular = PopularTitle::link(ongoing.clone(), &linked).unwrap();
        assert_eq!(popular.name, "Провожающая в последний путь Фрирен");
        assert_eq!(popular.en_name.as_deref(), Some("Frieren"));
        assert_eq!(popular.image_url.as_deref(), Some("https://img.example/1.jpg"));
        assert_eq!(popular.on_other_sources.len(), 1);

        assert!(PopularTitle::link(ongoing, &[]).is_none());
    }

    #[test]
    fn duration_label_rounds_to_minutes() {
        assert_eq!(Episode::duration_label(Some(1440)).as_deref(), Some("24 min"));
        assert_eq!(Episode::duration_label(Some(1469)).as_deref(), Some("24 min"));
        assert_eq!(Episode::duration_label(Some(1470)).as_deref(), Some("25 min"));
        assert_eq!(Episode::duration_label(None), None);
    }
}
