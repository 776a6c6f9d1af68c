//! Site adapters: the boundary to the external catalog websites.
//!
//! An adapter turns website responses into the raw records of
//! [`crate::models::scrape`]. Adapters are stateless apart from their HTTP
//! client and never touch the cache or the database.

use crate::models::scrape::{ParsedGenre, ParsedTitle, ParsedTitlesPage};

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Not found on website: {0}")]
    NotFound(String),

    #[error("Operation not supported by this website: {0}")]
    Unsupported(&'static str),

    #[error("Website request timed out")]
    Timeout,

    #[error("Website request failed: {0}")]
    Http(String),

    #[error("Failed to parse website response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}

#[async_trait::async_trait]
pub trait SiteAdapter: Send + Sync {
    /// One listing page, 1-based.
    ///
    /// # Errors
    ///
    /// Returns an [`AdapterError`] when the website cannot be read.
    async fn list_titles(&self, page: u32) -> Result<ParsedTitlesPage, AdapterError>;

    /// # Errors
    ///
    /// Returns [`AdapterError::NotFound`] for unknown ids.
    async fn get_title(&self, id_on_website: &str) -> Result<ParsedTitle, AdapterError>;

    /// Whether the website publishes a genre list with genre pages. Genres
    /// of websites without one are collected from title pages.
    fn lists_genres(&self) -> bool {
        true
    }

    /// # Errors
    ///
    /// Returns [`AdapterError::Unsupported`] for websites without genre pages.
    async fn list_genres(&self) -> Result<Vec<ParsedGenre>, AdapterError>;

    /// # Errors
    ///
    /// Returns [`AdapterError::Unsupported`] for websites without genre pages.
    async fn list_genre_titles(
        &self,
        genre_id_on_website: &str,
        page: u32,
    ) -> Result<ParsedTitlesPage, AdapterError>;
}
