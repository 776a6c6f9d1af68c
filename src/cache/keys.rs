use crate::domain::{GenreId, SourceId, TitleId};

/// A cacheable resource of one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    TitlesPage { source: SourceId, page: u32 },
    Title { source: SourceId, title: TitleId },
    Genres { source: SourceId },
    GenrePage { source: SourceId, genre: GenreId, page: u32 },
}

/// Which configured cache period a resource's marker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    Titles,
    Genres,
}

impl Resource {
    #[must_use]
    pub const fn source(&self) -> SourceId {
        match self {
            Self::TitlesPage { source, .. }
            | Self::Title { source, .. }
            | Self::Genres { source }
            | Self::GenrePage { source, .. } => *source,
        }
    }

    #[must_use]
    pub const fn class(&self) -> ResourceClass {
        match self {
            Self::Genres { .. } => ResourceClass::Genres,
            _ => ResourceClass::Titles,
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TitlesPage { .. } => "titles_page",
            Self::Title { .. } => "title",
            Self::Genres { .. } => "genres",
            Self::GenrePage { .. } => "genre_page",
        }
    }

    #[must_use]
    pub fn payload_key(&self) -> String {
        match self {
            Self::TitlesPage { source, page } => format!("{source}:titles:{page}"),
            Self::Title { source, title } => format!("{source}:title:{title}"),
            Self::Genres { source } => format!("{source}:genres"),
            Self::GenrePage {
                source,
                genre,
                page,
            } => format!("{source}:genre:{genre}:{page}"),
        }
    }

    #[must_use]
    pub fn marker_key(&self) -> String {
        format!("{}:fresh", self.payload_key())
    }
}

/// Every key of a source starts with this prefix.
#[must_use]
pub fn source_prefix(source: SourceId) -> String {
    format!("{source}:")
}

#[must_use]
pub fn metadata_key(shikimori_id: i64) -> String {
    format!("shikimori:{shikimori_id}")
}

#[must_use]
pub fn metadata_fail_key(title: TitleId) -> String {
    format!("shikimori:{title}:fail")
}

/// One page of the provider's popular ongoing list.
#[must_use]
pub fn popular_key(page: u32) -> String {
    format!("popular_ongoings:{page}")
}
