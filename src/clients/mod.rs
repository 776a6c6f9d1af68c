pub mod animevost;
pub mod shikimori;
