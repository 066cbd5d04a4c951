use thiserror::Error;

use crate::pipeline::PipelineStage;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Invalid value: {0}")]
    Value(String),

    #[error("Grouping error: {0}")]
    Grouping(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Fit quality error: {0}")]
    FitQuality(String),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<CalibrationError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid SER file: {0}")]
    InvalidSer(String),

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Invalid config: {0}")]
    Config(String),
}

impl CalibrationError {
    /// Wrap this error with the pipeline stage that raised it.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The innermost error, with any stage wrappers removed.
    pub fn root_cause(&self) -> &CalibrationError {
        match self {
            Self::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The stage that raised this error, if it came out of the pipeline.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;
