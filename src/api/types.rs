use crate::domain::{EpisodeId, SourceId};
use crate::models::catalog::Episode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

const fn first_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "first_page")]
    pub page: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct GenreNameQuery {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SourceDto {
    pub id: SourceId,
    pub name: &'static str,
    pub titles: u64,
    pub next_refresh_at: Option<String>,
    pub last_refresh_at: Option<String>,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshQueued {
    pub source: SourceId,
    /// False when a refresh of this source is already pending.
    pub queued: bool,
}

#[derive(Debug, Serialize)]
pub struct CacheFlushed {
    pub source: SourceId,
    pub removed: u64,
}

/// Persisted episode row, without scraped links.
#[derive(Debug, Serialize)]
pub struct EpisodeDto {
    pub id: EpisodeId,
    pub number: i32,
    pub name: String,
    pub is_m3u8: bool,
    pub duration: Option<i32>,
    pub duration_label: Option<String>,
}

impl From<crate::entities::episodes::Model> for EpisodeDto {
    fn from(row: crate::entities::episodes::Model) -> Self {
        Self {
            id: row.id.into(),
            number: row.number,
            name: row.name,
            is_m3u8: row.is_m3u8,
            duration: row.duration,
            duration_label: Episode::duration_label(row.duration),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub database: bool,
    pub sources: Vec<SourceId>,
    pub pending_jobs: usize,
}
