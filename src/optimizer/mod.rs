//! Optimization orchestration: the single-asset pipeline, batch fan-out and
//! deadline-bounded video jobs.

pub mod batch;
pub mod bounded;
pub mod pipeline;

pub use batch::BatchOrchestrator;
pub use bounded::{BoundedJobRunner, JobOutcome, JobState, VideoJob};
pub use pipeline::{MediaPipeline, OptimizationOutcome};
