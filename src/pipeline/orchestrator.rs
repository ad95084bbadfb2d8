use log::{debug, info, warn};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::interfaces::{
    ChunkSink, ChunkSource, ChunkTransform, LevelInfoFinalizer, ProgressListener,
};
use crate::types::{Resolution, RunError, RunOutcome, RunReport, RunState};

use super::context::{ConverterConfig, ProgressCounters};
use super::error_handler::{Cancel, ErrorCoordinator, SourceStop};
use super::jobs::{ConvertJob, WriteJob};
use super::stage::{BoundedStage, QueueGauge};

/// Main orchestrator: stream chunks from a source through a convert stage and a write stage.
///
/// Source → convert stage (transform) → write stage (sink), with a background count for
/// progress. One instance drives exactly one run; [`convert`](Self::convert) consumes it.
pub struct WorldConverter<S, X, K, L>
where
    S: ChunkSource,
    X: ChunkTransform<Input = S::Item>,
    K: ChunkSink<Item = X::Output>,
    L: LevelInfoFinalizer,
{
    level_info: L,
    source: Arc<S>,
    transform: Arc<X>,
    sink: Arc<K>,
    config: ConverterConfig,
    convert_stage: Arc<BoundedStage<S::Item>>,
    write_stage: Arc<BoundedStage<X::Output>>,
    counters: Arc<ProgressCounters>,
    errors: Arc<ErrorCoordinator>,
    interrupt: Arc<AtomicBool>,
}

impl<S, X, K, L> WorldConverter<S, X, K, L>
where
    S: ChunkSource + 'static,
    X: ChunkTransform<Input = S::Item> + 'static,
    K: ChunkSink<Item = X::Output> + 'static,
    L: LevelInfoFinalizer,
{
    pub fn new(level_info: L, source: S, transform: X, sink: K, config: ConverterConfig) -> Self {
        let source = Arc::new(source);
        let convert_stage = Arc::new(BoundedStage::new("convert", config.convert_capacity));
        let write_stage = Arc::new(BoundedStage::new("write", config.write_capacity));
        let counters = Arc::new(ProgressCounters::new(
            convert_stage.clone() as Arc<dyn QueueGauge>,
            write_stage.clone() as Arc<dyn QueueGauge>,
        ));
        let targets: Vec<Arc<dyn Cancel>> = vec![
            Arc::new(SourceStop(Arc::clone(&source))),
            convert_stage.clone() as Arc<dyn Cancel>,
            write_stage.clone() as Arc<dyn Cancel>,
        ];
        let errors = Arc::new(ErrorCoordinator::new(Arc::clone(&counters), targets));
        Self {
            level_info,
            source,
            transform: Arc::new(transform),
            sink: Arc::new(sink),
            config,
            convert_stage,
            write_stage,
            counters,
            errors,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Counters readable from any thread during and after the run.
    pub fn progress(&self) -> Arc<ProgressCounters> {
        Arc::clone(&self.counters)
    }

    /// Raising this flag ends submission between chunks; queued chunks still drain.
    /// Raised again while draining, it forces both stages down and abandons what is queued.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Run the conversion to completion.
    ///
    /// Returns `Err` only when reading the source or finalizing level info fails. Item failures
    /// are resolved through `listener.on_error` and reflected in the report's outcome.
    pub fn convert<P>(self, listener: Arc<P>) -> Result<RunReport, RunError>
    where
        P: ProgressListener<X::Output> + 'static,
    {
        self.counters.set_state(RunState::Running);
        let counting = self.start_counting();

        if let Err(e) = self.start_stages(&listener) {
            self.convert_stage.shutdown_forced();
            self.write_stage.shutdown_forced();
            self.convert_stage.join();
            self.write_stage.join();
            self.close_collaborators();
            self.counters.set_state(RunState::Aborted);
            return Err(e);
        }

        let (produced, mut interrupted) = self.submit_all();
        debug!("Source done: {} chunks submitted", self.counters.submitted());

        self.counters.set_state(RunState::Draining);
        let drain_forced = self.drain();
        interrupted |= drain_forced;

        self.counters.set_state(RunState::Closing);
        self.close_collaborators();
        if self.errors.discard_requested() {
            info!("Discarding converted output");
            if let Err(e) = self.sink.discard_output() {
                warn!("Discarding output failed: {:#}", e);
            }
        }
        finish_counting(counting);

        if let Err(e) = produced {
            self.counters.set_state(RunState::Aborted);
            return Err(RunError::SourceRead(e));
        }

        let resolution = self.errors.resolution();
        let mut finalized = false;
        // Any item failure, even an ignored one, leaves the output unfinalized.
        if resolution.is_none() {
            self.counters.set_state(RunState::Finalizing);
            if let Err(e) = self.level_info.finalize() {
                self.counters.set_state(RunState::Aborted);
                return Err(RunError::Finalize(e));
            }
            finalized = true;
        }
        self.counters.set_state(RunState::Done);

        let outcome = match resolution {
            Some(Resolution::StopDiscard) => RunOutcome::CompletedWithDiscardedOutput,
            Some(Resolution::StopKeepData | Resolution::IgnoreAll) => {
                RunOutcome::CompletedWithPartialOutput
            }
            None => RunOutcome::Completed,
        };
        Ok(RunReport {
            outcome,
            submitted: self.counters.submitted(),
            discovered: self.counters.discovered_total(),
            failures: self.counters.failures(),
            resolution,
            interrupted,
            finalized,
        })
    }

    /// Background count for progress only; nothing waits on it.
    fn start_counting(&self) -> Option<JoinHandle<()>> {
        let source = Arc::clone(&self.source);
        let counters = Arc::clone(&self.counters);
        let spawned = thread::Builder::new()
            .name("chunk-counter".to_string())
            .spawn(move || {
                if let Err(e) = source.count_all(&mut || counters.record_discovered()) {
                    warn!("Counting source chunks failed: {:#}", e);
                }
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Could not start chunk counting thread: {}", e);
                None
            }
        }
    }

    /// Start write workers first so convert workers always have somewhere to send.
    fn start_stages<P>(&self, listener: &Arc<P>) -> Result<(), RunError>
    where
        P: ProgressListener<X::Output> + 'static,
    {
        let write_job = WriteJob {
            sink: Arc::clone(&self.sink),
            errors: Arc::clone(&self.errors),
            listener: Arc::clone(listener),
        };
        self.write_stage
            .start(self.config.write_workers, move |item| write_job.run(item))
            .map_err(|source| RunError::Spawn {
                stage: "write",
                source,
            })?;

        let convert_job = ConvertJob {
            transform: Arc::clone(&self.transform),
            write_stage: Arc::clone(&self.write_stage),
            errors: Arc::clone(&self.errors),
            listener: Arc::clone(listener),
        };
        self.convert_stage
            .start(self.config.convert_workers, move |chunk| convert_job.run(chunk))
            .map_err(|source| RunError::Spawn {
                stage: "convert",
                source,
            })
    }

    /// Feed every source chunk to the convert stage on the calling thread.
    /// Returns the source result and whether the loop ended on the interrupt flag.
    fn submit_all(&self) -> (anyhow::Result<()>, bool) {
        let mut interrupted = false;
        let produced = self.source.produce_all(&mut |chunk| {
            if self.interrupt.load(Ordering::Acquire) {
                interrupted = true;
                return ControlFlow::Break(());
            }
            match self.convert_stage.submit(chunk) {
                Ok(()) => {
                    self.counters.record_submitted();
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    debug!("{}; stopping source", e);
                    ControlFlow::Break(())
                }
            }
        });
        if interrupted {
            info!("Interrupted; no more chunks will be submitted, draining queued ones");
            // Consumed here so only a new interrupt cuts the drain short.
            self.interrupt.store(false, Ordering::Release);
        }
        (produced, interrupted)
    }

    /// Shut down convert then write. A drain wait cut short by the interrupt flag forces
    /// that stage (and the write stage after a forced convert stage). Returns true if forced.
    fn drain(&self) -> bool {
        let poll = self.config.drain_poll;

        self.convert_stage.shutdown_graceful();
        let convert_forced = match self.convert_stage.await_termination(&self.interrupt, poll) {
            Ok(()) => false,
            Err(e) => {
                warn!("{}; forcing shutdown", e);
                self.convert_stage.shutdown_forced();
                true
            }
        };

        if convert_forced {
            self.write_stage.shutdown_forced();
        } else {
            self.write_stage.shutdown_graceful();
        }
        let write_forced = match self.write_stage.await_termination(&self.interrupt, poll) {
            Ok(()) => false,
            Err(e) => {
                warn!("{}; forcing shutdown", e);
                self.write_stage.shutdown_forced();
                true
            }
        };

        // In-flight jobs of a forced stage still finish before the sink is closed.
        self.convert_stage.join();
        self.write_stage.join();
        convert_forced || write_forced
    }

    fn close_collaborators(&self) {
        if let Err(e) = self.source.close() {
            warn!("Closing source failed: {:#}", e);
        }
        if let Err(e) = self.sink.close() {
            warn!("Closing sink failed: {:#}", e);
        }
    }
}

fn finish_counting(counting: Option<JoinHandle<()>>) {
    match counting {
        Some(handle) if handle.is_finished() => {
            let _ = handle.join();
        }
        Some(_) => debug!("Chunk counting still running; leaving it detached"),
        None => {}
    }
}
