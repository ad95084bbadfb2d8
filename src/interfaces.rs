//! Collaborator contracts the conversion engine is written against.
//!
//! The engine never looks inside a chunk. A format pair plugs in by implementing
//! [`ChunkSource`], [`ChunkTransform`], [`ChunkSink`] and [`LevelInfoFinalizer`];
//! the caller observes and steers the run through a [`ProgressListener`].

use anyhow::Result;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::types::{ItemFailure, Resolution};

/// Streams input chunks once and, independently, counts them for progress.
///
/// `produce_all` is driven by the orchestrator thread while `count_all` runs on a
/// background thread at the same time, so implementations must be `Sync`.
pub trait ChunkSource: Send + Sync {
    type Item: Send + 'static;

    /// Call `on_item` for each chunk, in any order. Stop early when `on_item` breaks
    /// or after [`request_stop`](Self::request_stop). An `Err` aborts the run.
    fn produce_all(&self, on_item: &mut dyn FnMut(Self::Item) -> ControlFlow<()>) -> Result<()>;

    /// Call `on_counted` once per chunk that `produce_all` would yield. Best effort.
    fn count_all(&self, on_counted: &mut dyn FnMut()) -> Result<()>;

    /// Ask `produce_all` (and `count_all`) to stop between items.
    fn request_stop(&self);

    fn close(&self) -> Result<()>;
}

/// Persists converted chunks. `accept` is called from every write worker concurrently.
pub trait ChunkSink: Send + Sync {
    type Item: Send + 'static;

    fn accept(&self, item: Self::Item) -> Result<()>;

    fn close(&self) -> Result<()>;

    /// Remove everything written so far. Only called after [`close`](Self::close).
    fn discard_output(&self) -> Result<()>;
}

/// Maps one input chunk to one output chunk. Called from every convert worker concurrently.
pub trait ChunkTransform: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn convert(&self, input: Self::Input) -> Result<Self::Output>;
}

/// Copies the small world descriptor files once all chunks are written.
pub trait LevelInfoFinalizer {
    fn finalize(&self) -> Result<()>;
}

/// Observer of a run. `on_error` runs inside the error coordinator's critical section
/// and must return promptly.
pub trait ProgressListener<Out>: Send + Sync {
    /// Called after each successful conversion, before the chunk is queued for writing.
    fn on_progress(&self, _converted: &Out) {}

    /// Decide how the run ends. Called at most once per run, for the first failure.
    fn on_error(&self, failure: &ItemFailure) -> Resolution;
}

/// Shared stop flag for sources implementing [`ChunkSource::request_stop`].
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
