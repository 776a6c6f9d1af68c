pub mod prelude;

pub mod cache_entries;
pub mod episodes;
pub mod genres;
pub mod source_schedules;
pub mod title_genres;
pub mod titles;
