//! Progress bar and listener for the CLI.

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use kdam::{Animation, Bar, BarExt};
use log::{error, trace};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::interfaces::ProgressListener;
use crate::pipeline::ProgressCounters;
use crate::types::{ItemFailure, Resolution};
use crate::utils::config::ProgressConsts;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a progress bar; the total is filled in later by the reporter.
pub fn create_progress_bar(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        unit = " chunks"
    )))
}

/// Update the bar's total (grows while the background count runs). Refreshes the display.
pub fn set_bar_total(pb: &ProgressBar, total: usize) {
    if let Ok(mut bar) = pb.try_lock()
        && bar.total != total
    {
        bar.total = total;
        let _ = bar.refresh();
    }
}

/// Advance the bar to `done` if it is behind.
/// Uses try_lock so convert workers never wait on the display; a skipped call is made up
/// by the next one, since `done` is a running total.
pub fn sync_progress_bar(pb: &ProgressBar, done: usize) {
    if let Ok(mut bar) = pb.try_lock() {
        advance_to(&mut bar, done);
    }
}

fn advance_to(bar: &mut Bar, done: usize) {
    if bar.counter < done {
        let behind = done - bar.counter;
        let _ = bar.update(behind);
    }
}

/// CLI listener: counts converted chunks onto the bar and answers failures with a fixed policy.
pub struct CliListener {
    policy: Resolution,
    bar: Option<ProgressBar>,
    converted: AtomicUsize,
}

impl CliListener {
    pub fn new(policy: Resolution, bar: Option<ProgressBar>) -> Self {
        Self {
            policy,
            bar,
            converted: AtomicUsize::new(0),
        }
    }

    /// Chunks reported converted so far.
    pub fn converted(&self) -> usize {
        self.converted.load(Ordering::Acquire)
    }

    /// Bring the bar up to the converted count, waiting for the lock. Call once the run is over.
    pub fn finish_bar(&self) {
        if let Some(bar) = &self.bar
            && let Ok(mut bar) = bar.lock()
        {
            advance_to(&mut bar, self.converted());
        }
    }
}

impl<Out> ProgressListener<Out> for CliListener {
    fn on_progress(&self, _converted: &Out) {
        let done = self.converted.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(bar) = &self.bar {
            sync_progress_bar(bar, done);
        }
    }

    fn on_error(&self, failure: &ItemFailure) -> Resolution {
        error!("First failed chunk: {}. Applying --on-error {:?}", failure, self.policy);
        self.policy
    }
}

/// Background reporter: keeps the bar total in step with the discovered count and traces
/// queue fill. Stops when the returned sender is dropped.
pub fn spawn_reporter(
    counters: Arc<ProgressCounters>,
    bar: Option<ProgressBar>,
) -> (Sender<()>, JoinHandle<()>) {
    let (stop_tx, stop_rx) = bounded::<()>(0);
    let handle = thread::spawn(move || {
        loop {
            match stop_rx.recv_timeout(ProgressConsts::REPORT_INTERVAL) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
            if let Some(bar) = &bar {
                set_bar_total(bar, counters.discovered_total().max(counters.submitted()));
            }
            trace!(
                "{:?}: convert queue {}/{}, write queue {}/{}",
                counters.state(),
                counters.convert_queue_fill(),
                counters.convert_queue_capacity(),
                counters.write_queue_fill(),
                counters.write_queue_capacity()
            );
        }
    });
    (stop_tx, handle)
}
