pub mod config;
pub mod config_toml;
pub mod logger;
pub mod tempfiles;

pub use config::*;
pub use logger::setup_logging;
pub use tempfiles::{prune_empty_dirs, temp_path_for, write_atomic};
