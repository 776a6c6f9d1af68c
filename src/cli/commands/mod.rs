mod refresh;
mod sources;

pub use refresh::cmd_refresh;
pub use sources::cmd_sources;
