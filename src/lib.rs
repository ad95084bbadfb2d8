//! Worldconv: concurrent chunk-by-chunk world converter.
//!
//! The engine ([`pipeline::WorldConverter`]) streams chunks from a [`ChunkSource`] through a
//! convert stage and a write stage into a [`ChunkSink`], with blocking backpressure between them
//! and a one-shot failure policy chosen by the [`ProgressListener`]. [`formats`] holds the
//! concrete legacy-to-Anvil format pair used by the CLI.

pub mod engine;
pub mod formats;
pub mod interfaces;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use interfaces::*;
pub use types::*;

pub use pipeline::{ConverterConfig, ProgressCounters, WorldConverter};

/// Result alias used by public worldconv API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
