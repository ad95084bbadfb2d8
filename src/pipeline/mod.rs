//! Conversion pipeline: bounded stages, jobs, error coordination and the orchestrator.

pub mod context;
pub mod error_handler;
pub mod jobs;
pub mod orchestrator;
pub mod stage;

pub use context::{ConverterConfig, ProgressCounters};
pub use error_handler::{Cancel, ErrorCoordinator, SourceStop};
pub use jobs::{ConvertJob, WriteJob};
pub use orchestrator::WorldConverter;
pub use stage::{BoundedStage, QueueGauge, StageError};
