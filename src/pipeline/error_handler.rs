//! Error coordinator: the first item failure of a run is resolved once, under a single lock.
//! Later failures are counted and logged but never reach the listener.

use log::{error, info, warn};
use std::sync::{Arc, Mutex, PoisonError};

use crate::interfaces::ChunkSource;
use crate::types::{ItemFailure, Resolution};

use super::context::ProgressCounters;
use super::stage::BoundedStage;

/// Something the coordinator stops when a failure is resolved as a stop.
pub trait Cancel: Send + Sync {
    fn cancel(&self);
}

impl<T: Send + 'static> Cancel for BoundedStage<T> {
    fn cancel(&self) {
        self.shutdown_forced();
    }
}

/// Adapter so a source's cooperative stop can sit next to the stages.
pub struct SourceStop<S>(pub Arc<S>);

impl<S: ChunkSource> Cancel for SourceStop<S> {
    fn cancel(&self) {
        self.0.request_stop();
    }
}

#[derive(Debug, Default)]
struct ErrorState {
    resolved: bool,
    resolution: Option<Resolution>,
}

pub struct ErrorCoordinator {
    state: Mutex<ErrorState>,
    counters: Arc<ProgressCounters>,
    /// Stopped in order on a stop resolution: source first, then the stages.
    targets: Vec<Arc<dyn Cancel>>,
}

impl ErrorCoordinator {
    pub fn new(counters: Arc<ProgressCounters>, targets: Vec<Arc<dyn Cancel>>) -> Self {
        Self {
            state: Mutex::new(ErrorState::default()),
            counters,
            targets,
        }
    }

    /// Record `failure`. If it is the first of the run, ask `decide` for a resolution and apply it.
    pub fn handle<F>(&self, failure: ItemFailure, decide: F)
    where
        F: FnOnce(&ItemFailure) -> Resolution,
    {
        self.counters.record_failure();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.resolved {
            warn!("Absorbed after resolution: {}", failure);
            return;
        }
        error!("{}", failure);
        let resolution = decide(&failure);
        state.resolution = Some(resolution);
        state.resolved = true;
        if resolution.stops_run() {
            info!("Stopping conversion ({:?})", resolution);
            for target in &self.targets {
                target.cancel();
            }
        } else {
            warn!("Ignoring failed chunks for the rest of the run; level info will not be copied");
        }
    }

    /// Resolution of the first failure, `None` if no failure happened.
    pub fn resolution(&self) -> Option<Resolution> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resolution
    }

    /// True when output must be deleted after the sink is closed.
    pub fn discard_requested(&self) -> bool {
        self.resolution() == Some(Resolution::StopDiscard)
    }
}
