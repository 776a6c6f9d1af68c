pub mod cache;
pub mod episode;
pub mod genre;
pub mod schedule;
pub mod title;
