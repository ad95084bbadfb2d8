//! Public types for the conversion engine: run states, resolutions, outcomes and errors.

use std::fmt;

/// Operator decision taken once per run, after the first item failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    /// Stop the run and delete everything written so far.
    StopDiscard,
    /// Stop the run and keep whatever was already written.
    #[value(name = "stop-keep")]
    #[serde(rename = "stop-keep")]
    StopKeepData,
    /// Lose the failed item and keep going; later failures are absorbed too.
    /// Level info is not copied at the end.
    #[value(name = "ignore")]
    #[serde(rename = "ignore")]
    IgnoreAll,
}

impl Resolution {
    /// True when the resolution cancels the run (source stopped, both stages force-shut).
    pub fn stops_run(self) -> bool {
        matches!(self, Resolution::StopDiscard | Resolution::StopKeepData)
    }
}

/// Lifecycle of one [`WorldConverter`](crate::pipeline::WorldConverter) run.
/// Written only by the orchestrator thread; readable from anywhere through the progress counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Running = 1,
    Draining = 2,
    Closing = 3,
    Finalizing = 4,
    Done = 5,
    Aborted = 6,
}

impl RunState {
    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            1 => RunState::Running,
            2 => RunState::Draining,
            3 => RunState::Closing,
            4 => RunState::Finalizing,
            5 => RunState::Done,
            6 => RunState::Aborted,
            _ => RunState::Idle,
        }
    }
}

/// How a run ended when it did not surface a [`RunError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// No chunk failed; level info was finalized. An interrupted drain still ends here.
    Completed,
    /// First failure resolved as [`Resolution::StopDiscard`]; written output was discarded.
    CompletedWithDiscardedOutput,
    /// First failure resolved as [`Resolution::StopKeepData`] or [`Resolution::IgnoreAll`];
    /// output is partial and level info was not copied.
    CompletedWithPartialOutput,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::CompletedWithDiscardedOutput => "completed, output discarded",
            RunOutcome::CompletedWithPartialOutput => "completed, output partial",
        };
        f.write_str(s)
    }
}

/// Summary returned by [`WorldConverter::convert`](crate::pipeline::WorldConverter::convert).
#[derive(Clone, Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Items handed to the convert stage.
    pub submitted: usize,
    /// Items the background count had discovered when the run finished (advisory).
    pub discovered: usize,
    /// Convert/write failures observed, including the ones absorbed after resolution.
    pub failures: usize,
    /// Resolution chosen for the first failure, if any failure happened.
    pub resolution: Option<Resolution>,
    /// The run was interrupted (early stop of the source loop or of a drain wait).
    pub interrupted: bool,
    /// The level info finalizer ran successfully.
    pub finalized: bool,
}

/// Failure of a single item inside a stage. Routed to the error coordinator, never to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ItemFailure {
    #[error("chunk conversion failed: {0:#}")]
    Convert(#[source] anyhow::Error),
    #[error("chunk write failed: {0:#}")]
    Write(#[source] anyhow::Error),
    #[error("{stage} worker panicked: {message}")]
    Panicked { stage: &'static str, message: String },
}

/// Errors that end [`WorldConverter::convert`](crate::pipeline::WorldConverter::convert) with `Err`.
/// Everything else is handled inside the run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("reading source chunks failed: {0:#}")]
    SourceRead(#[source] anyhow::Error),
    #[error("level info finalization failed: {0:#}")]
    Finalize(#[source] anyhow::Error),
    #[error("starting {stage} workers failed: {source}")]
    Spawn {
        stage: &'static str,
        source: std::io::Error,
    },
}
