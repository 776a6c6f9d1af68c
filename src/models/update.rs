//! Change sets computed when a scrape disagrees with a persisted row.

use crate::entities::titles;
use crate::models::scrape::{ParsedTitle, ParsedTitleShort};
use serde::{Deserialize, Serialize};

/// Full replacement of the mutable title columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleUpdate {
    pub name: String,
    pub en_name: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub page_fetched: bool,
}

impl TitleUpdate {
    /// Listing entries only carry name and poster; anything else is kept.
    #[must_use]
    pub fn from_listing(row: &titles::Model, raw: &ParsedTitleShort) -> Option<Self> {
        let image_url = raw.image_url.clone().or_else(|| row.image_url.clone());
        if row.name == raw.name && row.image_url == image_url {
            return None;
        }

        Some(Self {
            name: raw.name.clone(),
            en_name: raw.en_name.clone().or_else(|| row.en_name.clone()),
            image_url,
            description: row.description.clone(),
            page_fetched: row.page_fetched,
        })
    }

    /// A detail scrape also fills the description and marks the page fetched.
    #[must_use]
    pub fn from_detail(row: &titles::Model, detail: &ParsedTitle) -> Option<Self> {
        let update = Self {
            name: detail.name.clone(),
            en_name: detail.en_name.clone().or_else(|| row.en_name.clone()),
            image_url: detail.image_url.clone().or_else(|| row.image_url.clone()),
            description: detail
                .description
                .clone()
                .or_else(|| row.description.clone()),
            page_fetched: true,
        };

        let unchanged = row.page_fetched
            && row.name == update.name
            && row.en_name == update.en_name
            && row.image_url == update.image_url
            && row.description == update.description;

        (!unchanged).then_some(update)
    }
}
