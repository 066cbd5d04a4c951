/// Pipeline processing stage, used for progress reporting and error context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Grouping,
    BiasEstimation,
    VarianceEstimation,
    TransferCurveFit,
    Assembly,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grouping => write!(f, "Grouping frames"),
            Self::BiasEstimation => write!(f, "Estimating bias"),
            Self::VarianceEstimation => write!(f, "Estimating variance"),
            Self::TransferCurveFit => write!(f, "Fitting transfer curve"),
            Self::Assembly => write!(f, "Assembling result"),
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., exposure levels), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter, used when `run_calibration` delegates.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
