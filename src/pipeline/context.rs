//! Run tuning and shared progress state: what the orchestrator sizes stages with and
//! what any thread may read while a run is in progress.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use crate::types::RunState;
use crate::utils::config::{QueueConsts, WorkerThreadLimits};

use super::stage::QueueGauge;

/// Worker counts and queue capacities for the two stages. Fixed for the run.
#[derive(Clone, Debug)]
pub struct ConverterConfig {
    pub convert_workers: usize,
    pub write_workers: usize,
    pub convert_capacity: usize,
    pub write_capacity: usize,
    /// How often drain waits check the interrupt flag.
    pub drain_poll: Duration,
}

impl ConverterConfig {
    /// Both stages sized to hardware parallelism with the default queue factors.
    pub fn from_hardware() -> Self {
        Self::with_workers(WorkerThreadLimits::current().stage_threads())
    }

    /// Both stages sized to `workers` with the default queue factors.
    pub fn with_workers(workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            convert_workers: workers,
            write_workers: workers,
            convert_capacity: QueueConsts::CONVERT_QUEUE_FACTOR * workers,
            write_capacity: QueueConsts::WRITE_QUEUE_FACTOR * workers,
            drain_poll: QueueConsts::DRAIN_POLL,
        }
    }

    /// Recompute capacities as `factor × workers` for each stage.
    pub fn with_queue_factors(mut self, convert_factor: usize, write_factor: usize) -> Self {
        self.convert_capacity = convert_factor.max(1) * self.convert_workers;
        self.write_capacity = write_factor.max(1) * self.write_workers;
        self
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self::from_hardware()
    }
}

/// Concurrency-safe run counters. Every read is a plain atomic load, so observers never
/// block the pipeline.
pub struct ProgressCounters {
    /// Written only by the background counting thread.
    discovered_total: AtomicUsize,
    /// Written only by the submission loop.
    submitted: AtomicUsize,
    failures: AtomicUsize,
    state: AtomicU8,
    convert_queue: Arc<dyn QueueGauge>,
    write_queue: Arc<dyn QueueGauge>,
}

impl ProgressCounters {
    pub(crate) fn new(convert_queue: Arc<dyn QueueGauge>, write_queue: Arc<dyn QueueGauge>) -> Self {
        Self {
            discovered_total: AtomicUsize::new(0),
            submitted: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            state: AtomicU8::new(RunState::Idle as u8),
            convert_queue,
            write_queue,
        }
    }

    pub(crate) fn record_discovered(&self) {
        self.discovered_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_state(&self, state: RunState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Chunks found so far by the background count. Advisory, may lag or stay short.
    pub fn discovered_total(&self) -> usize {
        self.discovered_total.load(Ordering::Relaxed)
    }

    /// Chunks handed to the convert stage.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Convert/write failures observed, including absorbed ones.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn convert_queue_fill(&self) -> usize {
        self.convert_queue.queued()
    }

    pub fn convert_queue_capacity(&self) -> usize {
        self.convert_queue.capacity()
    }

    pub fn write_queue_fill(&self) -> usize {
        self.write_queue.queued()
    }

    pub fn write_queue_capacity(&self) -> usize {
        self.write_queue.capacity()
    }
}
