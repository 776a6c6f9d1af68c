pub use super::cache_entries::Entity as CacheEntries;
pub use super::episodes::Entity as Episodes;
pub use super::genres::Entity as Genres;
pub use super::source_schedules::Entity as SourceSchedules;
pub use super::title_genres::Entity as TitleGenres;
pub use super::titles::Entity as Titles;
