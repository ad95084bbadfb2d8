//! Bounded stage: a fixed pool of named worker threads draining a fixed-capacity queue.
//!
//! `submit` blocks while the queue is full. Once the stage is shut down, `submit` is
//! rejected, including producers that were already blocked on a full queue.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Errors returned by [`BoundedStage`] operations.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum StageError {
    /// The stage is shutting down; the producer must stop submitting.
    #[error("{stage} stage is shut down, job rejected")]
    Rejected { stage: &'static str },
    /// The interrupt flag was raised while waiting for the stage to drain.
    #[error("interrupted while waiting for the {stage} stage to drain")]
    Interrupted { stage: &'static str },
}

/// Read-only view of a stage queue for progress reporting.
pub trait QueueGauge: Send + Sync {
    fn queued(&self) -> usize;
    fn capacity(&self) -> usize;
}

pub struct BoundedStage<T> {
    name: &'static str,
    capacity: usize,
    /// `None` once shutdown has begun. Submitters clone it and never hold the lock while blocked.
    job_tx: Mutex<Option<Sender<T>>>,
    job_rx: Receiver<T>,
    /// Never sent on; dropping the sender wakes every blocked submitter.
    open_tx: Mutex<Option<Sender<()>>>,
    open_rx: Receiver<()>,
    aborted: Arc<AtomicBool>,
    /// Each worker holds a clone; disconnect means every worker has exited.
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Send + 'static> BoundedStage<T> {
    /// Create the queue. No worker runs until [`start`](Self::start).
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let (job_tx, job_rx) = bounded::<T>(capacity.max(1));
        let (open_tx, open_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded::<()>(0);
        Self {
            name,
            capacity: capacity.max(1),
            job_tx: Mutex::new(Some(job_tx)),
            job_rx,
            open_tx: Mutex::new(Some(open_tx)),
            open_rx,
            aborted: Arc::new(AtomicBool::new(false)),
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn `num_workers` threads named `<stage>-<i>`, each running `handler` on dequeued jobs.
    pub fn start<F>(&self, num_workers: usize, handler: F) -> std::io::Result<()>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let Some(done_tx) = lock(&self.done_tx).take() else {
            return Ok(());
        };
        let handler = Arc::new(handler);
        let mut workers = lock(&self.workers);
        for i in 0..num_workers.max(1) {
            let job_rx = self.job_rx.clone();
            let aborted = Arc::clone(&self.aborted);
            let handler = Arc::clone(&handler);
            let done_tx = done_tx.clone();
            let name = self.name;
            let handle = thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || worker_loop(name, job_rx, aborted, handler, done_tx))?;
            workers.push(handle);
        }
        debug!(
            "{} stage: {} workers, queue capacity {}",
            self.name,
            workers.len(),
            self.capacity
        );
        Ok(())
    }

    /// Queue `job`, blocking while the queue is full. Rejected once shutdown has begun.
    pub fn submit(&self, job: T) -> Result<(), StageError> {
        let rejected = StageError::Rejected { stage: self.name };
        let Some(job_tx) = lock(&self.job_tx).clone() else {
            return Err(rejected);
        };
        select! {
            send(job_tx, job) -> res => res.map_err(|_| rejected),
            recv(self.open_rx) -> _ => Err(rejected),
        }
    }

    /// Stop accepting jobs; queued and in-flight jobs still run.
    pub fn shutdown_graceful(&self) {
        if lock(&self.job_tx).take().is_some() {
            debug!("{} stage: graceful shutdown", self.name);
        }
        drop(lock(&self.open_tx).take());
    }

    /// Stop accepting jobs and abandon queued ones. In-flight jobs run to completion
    /// but can observe [`is_aborted`](Self::is_aborted).
    pub fn shutdown_forced(&self) {
        if !self.aborted.swap(true, Ordering::AcqRel) {
            debug!("{} stage: forced shutdown", self.name);
        }
        self.shutdown_graceful();
    }

    /// Wait until every worker has exited. Returns [`StageError::Interrupted`] if `interrupt`
    /// is raised first; the workers keep running in that case.
    pub fn await_termination(
        &self,
        interrupt: &AtomicBool,
        poll: Duration,
    ) -> Result<(), StageError> {
        // Never started: release the unused completion sender so the wait ends at once.
        drop(lock(&self.done_tx).take());
        loop {
            match self.done_rx.recv_timeout(poll) {
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) if interrupt.load(Ordering::Acquire) => {
                    return Err(StageError::Interrupted { stage: self.name });
                }
                _ => {}
            }
        }
        self.join();
        Ok(())
    }

    /// Join every worker without interruption. Used after a forced shutdown.
    pub fn join(&self) {
        drop(lock(&self.done_tx).take());
        let handles: Vec<_> = lock(&self.workers).drain(..).collect();
        for h in handles {
            if h.join().is_err() {
                warn!("{} worker thread panicked", self.name);
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        lock(&self.job_tx).is_none()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T: Send> QueueGauge for BoundedStage<T> {
    fn queued(&self) -> usize {
        self.job_rx.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Single worker: run `handler` on each job until the queue is closed and empty.
/// After a forced shutdown, remaining jobs are drained without running.
fn worker_loop<T, F>(
    name: &'static str,
    job_rx: Receiver<T>,
    aborted: Arc<AtomicBool>,
    handler: Arc<F>,
    done_tx: Sender<()>,
) where
    F: Fn(T),
{
    let mut abandoned = 0_usize;
    while let Ok(job) = job_rx.recv() {
        if aborted.load(Ordering::Acquire) {
            abandoned += 1;
            continue;
        }
        (*handler)(job);
    }
    if abandoned > 0 {
        debug!("{name} worker abandoned {abandoned} queued jobs");
    }
    drop(done_tx);
}
