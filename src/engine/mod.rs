//! CLI layer: argument parsing, settings resolution, progress display.

pub mod arg_parser;
pub mod cli;
pub mod progress;

pub use arg_parser::Cli;
pub use cli::{RunSettings, handle_run, resolve_settings};
pub use progress::{CliListener, ProgressBar, create_progress_bar};
