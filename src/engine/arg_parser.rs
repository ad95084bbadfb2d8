use clap::Parser;
use std::path::PathBuf;

use crate::types::Resolution;

/// Concurrent chunk-by-chunk world converter.
#[derive(Clone, Parser)]
#[command(name = "worldconv")]
#[command(about = "Convert a Nukkit world's chunks to Anvil block ids and copy its level info.")]
pub struct Cli {
    /// Source world directory (contains `chunks/` and `level.dat`).
    #[arg(value_name = "SRC")]
    pub src: PathBuf,

    /// Destination world directory. Created if missing.
    #[arg(value_name = "DST")]
    pub dst: PathBuf,

    /// Worker threads per stage. Default: available parallelism.
    #[arg(long, short = 't')]
    pub threads: Option<usize>,

    /// Write stage worker threads. Default: same as --threads.
    #[arg(long)]
    pub write_threads: Option<usize>,

    /// Convert queue slots per convert worker.
    #[arg(long)]
    pub convert_queue_factor: Option<usize>,

    /// Write queue slots per write worker.
    #[arg(long)]
    pub write_queue_factor: Option<usize>,

    /// What to do after the first failed chunk.
    #[arg(long, value_enum)]
    pub on_error: Option<Resolution>,

    /// Config file. Default: `worldconv.toml` in SRC, if present.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Verbose output and progress bar.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
