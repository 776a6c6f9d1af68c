//! Background work for the catalog.
//!
//! The request path never waits on refreshes or reconciliation writes; it
//! pushes a [`Job`] onto the [`JobQueue`] and returns. A fixed pool of
//! workers drains the queue through a [`JobDispatcher`].

mod dispatcher;
mod queue;

pub use dispatcher::{CatalogDispatcher, DispatchStatus, JobDispatcher};
pub use queue::{JobQueue, JobReceiver, WorkerPool, spawn_workers};

use crate::domain::{GenreId, SourceId, TitleId};
use crate::models::update::TitleUpdate;
use crate::services::duration::ProbeTarget;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    RefreshTitlesPage {
        source: SourceId,
        page: u32,
    },
    RefreshTitle {
        source: SourceId,
        title: TitleId,
        id_on_website: String,
    },
    RefreshGenres {
        source: SourceId,
    },
    RefreshGenrePage {
        source: SourceId,
        genre: GenreId,
        genre_id_on_website: String,
        page: u32,
    },
    UpdateTitle {
        title: TitleId,
        update: TitleUpdate,
    },
    RenameGenre {
        genre: GenreId,
        name: String,
    },
    LinkGenres {
        title: TitleId,
        genres: Vec<GenreId>,
    },
    SetMetadataId {
        title: TitleId,
        shikimori_id: Option<i64>,
    },
    RefreshMetadata {
        shikimori_id: i64,
    },
    ProbeDurations {
        title: TitleId,
        episodes: Vec<ProbeTarget>,
    },
    CheckSource {
        source: SourceId,
    },
    FullRefresh {
        source: SourceId,
    },
}

/// How often a failed job is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const ONCE: Self = Self {
        max_attempts: 1,
        backoff: Duration::ZERO,
    };
}

impl Job {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RefreshTitlesPage { .. } => "refresh_titles_page",
            Self::RefreshTitle { .. } => "refresh_title",
            Self::RefreshGenres { .. } => "refresh_genres",
            Self::RefreshGenrePage { .. } => "refresh_genre_page",
            Self::UpdateTitle { .. } => "update_title",
            Self::RenameGenre { .. } => "rename_genre",
            Self::LinkGenres { .. } => "link_genres",
            Self::SetMetadataId { .. } => "set_metadata_id",
            Self::RefreshMetadata { .. } => "refresh_metadata",
            Self::ProbeDurations { .. } => "probe_durations",
            Self::CheckSource { .. } => "check_source",
            Self::FullRefresh { .. } => "full_refresh",
        }
    }

    /// Jobs with equal keys are not queued twice.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        match self {
            Self::RefreshTitlesPage { source, page } => format!("refresh:{source}:titles:{page}"),
            Self::RefreshTitle { source, title, .. } => format!("refresh:{source}:title:{title}"),
            Self::RefreshGenres { source } => format!("refresh:{source}:genres"),
            Self::RefreshGenrePage {
                source,
                genre,
                page,
                ..
            } => format!("refresh:{source}:genre:{genre}:{page}"),
            Self::UpdateTitle { title, .. } => format!("update:title:{title}"),
            Self::RenameGenre { genre, .. } => format!("update:genre:{genre}"),
            Self::LinkGenres { title, .. } => format!("link:genres:{title}"),
            Self::SetMetadataId { title, .. } => format!("metadata:title:{title}"),
            Self::RefreshMetadata { shikimori_id } => format!("metadata:refresh:{shikimori_id}"),
            Self::ProbeDurations { title, .. } => format!("probe:{title}"),
            Self::CheckSource { source } => format!("check:{source}"),
            Self::FullRefresh { source } => format!("full_refresh:{source}"),
        }
    }

    /// Refreshes, writes and probes run once; the next natural read or
    /// scheduled run picks them up again.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::RefreshMetadata { .. } => RetryPolicy {
                max_attempts: 2,
                backoff: Duration::from_secs(30),
            },
            _ => RetryPolicy::ONCE,
        }
    }
}
