pub mod config;
mod orchestrator;
mod types;

pub use orchestrator::{run_calibration, run_calibration_reported, transfer_points};
pub use types::{NoOpReporter, PipelineStage, ProgressReporter};
