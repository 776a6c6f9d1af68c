pub mod catalog;
pub mod scrape;
pub mod update;
