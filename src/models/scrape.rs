//! Raw records returned by site adapters.
//!
//! These are the values stored in the cache. They carry website identifiers
//! only; persisted identity is attached during reconciliation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTitleShort {
    pub id_on_website: String,
    pub name: String,
    #[serde(default)]
    pub en_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Free-form line shown under the name (series count, year, ...).
    #[serde(default)]
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTitlesPage {
    pub titles: Vec<ParsedTitleShort>,
    pub total_pages: u32,
}

/// Reference to another title on the same site, without a poster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkParsedTitle {
    pub id_on_website: String,
    pub name: String,
    #[serde(default)]
    pub en_name: Option<String>,
}

impl From<LinkParsedTitle> for ParsedTitleShort {
    fn from(link: LinkParsedTitle) -> Self {
        Self {
            id_on_website: link.id_on_website,
            name: link.name,
            en_name: link.en_name,
            image_url: None,
            additional_info: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLink {
    pub name: String,
    pub link: String,
    #[serde(default)]
    pub quality: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEpisode {
    pub name: String,
    pub number: i32,
    #[serde(default)]
    pub links: Vec<ParsedLink>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(default)]
    pub is_m3u8: bool,
}

impl ParsedEpisode {
    /// Highest quality link, or the first one when no quality is known.
    #[must_use]
    pub fn preferred_link(&self) -> Option<&ParsedLink> {
        self.links
            .iter()
            .filter(|link| link.quality.is_some())
            .max_by_key(|link| link.quality)
            .or_else(|| self.links.first())
    }
}

/// Full title page as scraped from a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTitle {
    pub id_on_website: String,
    pub name: String,
    #[serde(default)]
    pub en_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub additional_info: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub series_info: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub episodes_message: Option<String>,
    #[serde(default)]
    pub episodes_list: Vec<ParsedEpisode>,
    #[serde(default)]
    pub related_titles: Vec<LinkParsedTitle>,
    #[serde(default)]
    pub recommended_titles: Vec<ParsedTitleShort>,
    #[serde(default)]
    pub genres_names: Vec<String>,
}

impl ParsedTitle {
    #[must_use]
    pub fn to_short(&self) -> ParsedTitleShort {
        ParsedTitleShort {
            id_on_website: self.id_on_website.clone(),
            name: self.name.clone(),
            en_name: self.en_name.clone(),
            image_url: self.image_url.clone(),
            additional_info: self.additional_info.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedGenre {
    pub id_on_website: String,
    pub name: String,
}
