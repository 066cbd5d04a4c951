use ndarray::{Array2, ArrayD, ArrayView2, Ix2};
use serde::{Deserialize, Serialize};

use crate::camera::Housekeeping;
use crate::error::{CalibrationError, Result};

/// Identifies the sensor and readout context a frame was captured in.
///
/// Frames may only be combined when their camera ids are equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraId {
    pub serial_number: String,
    #[serde(default)]
    pub run_mode: String,
}

impl CameraId {
    pub fn new(serial_number: impl Into<String>, run_mode: impl Into<String>) -> Self {
        Self {
            serial_number: serial_number.into(),
            run_mode: run_mode.into(),
        }
    }
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.run_mode.is_empty() {
            write!(f, "{}", self.serial_number)
        } else {
            write!(f, "{} ({})", self.serial_number, self.run_mode)
        }
    }
}

/// Optional per-frame metadata carried alongside the pixels.
#[derive(Clone, Debug, Default)]
pub struct FrameMetadata {
    /// Index of the frame within its source file.
    pub frame_index: usize,
    pub timestamp_us: Option<u64>,
    pub housekeeping: Option<Housekeeping>,
}

/// A single raw calibration exposure.
///
/// Pixel values are raw ADC counts, row-major, shape = (height, width).
/// A zero exposure time marks a bias frame. Frames are immutable once built.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Array2<u16>,
    exposure_time: f64,
    camera: CameraId,
    metadata: FrameMetadata,
}

impl Frame {
    pub fn new(data: Array2<u16>, exposure_time: f64, camera: CameraId) -> Result<Self> {
        let (h, w) = data.dim();
        if h == 0 || w == 0 {
            return Err(CalibrationError::Shape(format!(
                "frame must have non-zero extent, got {h}x{w}"
            )));
        }
        if !exposure_time.is_finite() || exposure_time < 0.0 {
            return Err(CalibrationError::Value(format!(
                "exposure time must be a non-negative number of seconds, got {exposure_time}"
            )));
        }
        Ok(Self {
            data,
            exposure_time,
            camera,
            metadata: FrameMetadata::default(),
        })
    }

    /// Build a frame from a row-major buffer of `height * width` counts.
    pub fn from_shape_vec(
        shape: (usize, usize),
        pixels: Vec<u16>,
        exposure_time: f64,
        camera: CameraId,
    ) -> Result<Self> {
        let len = pixels.len();
        let data = Array2::from_shape_vec(shape, pixels).map_err(|_| {
            CalibrationError::Shape(format!(
                "{} pixels cannot fill a {}x{} frame",
                len, shape.0, shape.1
            ))
        })?;
        Self::new(data, exposure_time, camera)
    }

    /// Build a frame from nested rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<u16>>, exposure_time: f64, camera: CameraId) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(CalibrationError::Shape(format!(
                "row {i} has {} columns, expected {width}",
                row.len()
            )));
        }
        let pixels: Vec<u16> = rows.into_iter().flatten().collect();
        Self::from_shape_vec((height, width), pixels, exposure_time, camera)
    }

    /// Build a frame from an array of arbitrary rank; only 2D is accepted.
    pub fn from_dyn(data: ArrayD<u16>, exposure_time: f64, camera: CameraId) -> Result<Self> {
        let ndim = data.ndim();
        let data = data.into_dimensionality::<Ix2>().map_err(|_| {
            CalibrationError::Shape(format!("frame data must be 2D, got {ndim} dimensions"))
        })?;
        Self::new(data, exposure_time, camera)
    }

    pub fn with_metadata(mut self, metadata: FrameMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn data(&self) -> ArrayView2<'_, u16> {
        self.data.view()
    }

    /// Pixel counts as f64, materialized on demand.
    pub fn counts(&self) -> Array2<f64> {
        self.data.mapv(f64::from)
    }

    /// Exposure time in seconds.
    pub fn exposure_time(&self) -> f64 {
        self.exposure_time
    }

    pub fn is_bias(&self) -> bool {
        self.exposure_time == 0.0
    }

    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}
