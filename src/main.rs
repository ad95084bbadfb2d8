//! Worldconv CLI: convert a world's chunks through the concurrent pipeline.

use anyhow::Result;
use clap::Parser;
use std::time::Instant;
use worldconv::engine::arg_parser::Cli;
use worldconv::engine::handle_run;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
