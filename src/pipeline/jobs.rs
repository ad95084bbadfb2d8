use log::debug;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::interfaces::{ChunkSink, ChunkTransform, ProgressListener};
use crate::types::ItemFailure;

use super::error_handler::ErrorCoordinator;
use super::stage::BoundedStage;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Runs inside a convert worker: transform one chunk, then queue it for writing.
/// Failures go to the coordinator; the worker keeps running.
pub struct ConvertJob<X: ChunkTransform, P> {
    pub transform: Arc<X>,
    pub write_stage: Arc<BoundedStage<X::Output>>,
    pub errors: Arc<ErrorCoordinator>,
    pub listener: Arc<P>,
}

impl<X, P> ConvertJob<X, P>
where
    X: ChunkTransform,
    P: ProgressListener<X::Output>,
{
    pub fn run(&self, input: X::Input) {
        let failure = match catch_unwind(AssertUnwindSafe(|| self.transform.convert(input))) {
            Ok(Ok(converted)) => {
                self.listener.on_progress(&converted);
                if let Err(e) = self.write_stage.submit(converted) {
                    debug!("{}; converted chunk dropped", e);
                }
                return;
            }
            Ok(Err(e)) => ItemFailure::Convert(e),
            Err(payload) => ItemFailure::Panicked {
                stage: "convert",
                message: panic_message(payload.as_ref()),
            },
        };
        self.errors.handle(failure, |f| self.listener.on_error(f));
    }
}

/// Runs inside a write worker: persist one converted chunk.
pub struct WriteJob<K, P> {
    pub sink: Arc<K>,
    pub errors: Arc<ErrorCoordinator>,
    pub listener: Arc<P>,
}

impl<K, P> WriteJob<K, P>
where
    K: ChunkSink,
    P: ProgressListener<K::Item>,
{
    pub fn run(&self, item: K::Item) {
        let failure = match catch_unwind(AssertUnwindSafe(|| self.sink.accept(item))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => ItemFailure::Write(e),
            Err(payload) => ItemFailure::Panicked {
                stage: "write",
                message: panic_message(payload.as_ref()),
            },
        };
        self.errors.handle(failure, |f| self.listener.on_error(f));
    }
}
