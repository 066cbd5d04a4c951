use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::camera::{Camera, Housekeeping, HousekeepingReading};
use crate::error::{CalibrationError, Result};
use crate::frame::{CameraId, Frame, FrameMetadata};
use crate::io::image_io::load_counts;
use crate::io::ser::SerReader;
use crate::taps::active_frame;

/// A calibration run on disk: which camera, and which recordings were taken
/// at which exposure.
///
/// ```toml
/// crop_active = true
///
/// [camera]
/// serial_number = "SN20"
/// run_mode = "full-frame"
///
/// [[sequences]]
/// path = "bias.ser"
/// exposure_time = 0.0
///
/// [[sequences]]
/// path = "flat_10s.ser"
/// exposure_counts = 400000000
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub camera: CameraId,
    #[serde(default)]
    pub model: Camera,
    /// Drop blank and overscan columns before calibrating.
    #[serde(default)]
    pub crop_active: bool,
    #[serde(default)]
    pub sequences: Vec<Sequence>,
    /// Directory relative sequence paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// One recording: a SER file of many frames or a single image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    pub path: PathBuf,
    /// Exposure in seconds.
    #[serde(default)]
    pub exposure_time: Option<f64>,
    /// Exposure in camera clock counts.
    #[serde(default)]
    pub exposure_counts: Option<u64>,
    #[serde(default)]
    pub housekeeping: Option<Housekeeping>,
}

/// What a sequence holds, without decoding its pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceInfo {
    pub path: PathBuf,
    pub exposure_time: f64,
    pub frames: usize,
    pub width: usize,
    pub height: usize,
    /// Instrument named in a SER header, if any.
    pub instrument: Option<String>,
    pub housekeeping: Option<HousekeepingReading>,
}

impl Sequence {
    /// Exposure time in seconds; exactly one of the two fields must be set.
    pub fn exposure_seconds(&self) -> Result<f64> {
        match (self.exposure_time, self.exposure_counts) {
            (Some(t), None) => Ok(t),
            (None, Some(c)) => Ok(Camera::calibrate_exposure(c)),
            (Some(_), Some(_)) => Err(CalibrationError::Manifest(format!(
                "{}: give exposure_time or exposure_counts, not both",
                self.path.display()
            ))),
            (None, None) => Err(CalibrationError::Manifest(format!(
                "{}: missing exposure_time or exposure_counts",
                self.path.display()
            ))),
        }
    }

    fn is_ser(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("ser"))
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::parse(&text, base_dir)
    }

    pub fn parse(text: &str, base_dir: PathBuf) -> Result<Self> {
        let mut manifest: Self =
            toml::from_str(text).map_err(|e| CalibrationError::Manifest(e.to_string()))?;
        manifest.base_dir = base_dir;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sequences.is_empty() {
            return Err(CalibrationError::Manifest("no [[sequences]] listed".into()));
        }
        self.model
            .validate()
            .map_err(|e| CalibrationError::Manifest(format!("[model]: {e}")))?;
        for seq in &self.sequences {
            let t = seq.exposure_seconds()?;
            if !t.is_finite() || t < 0.0 {
                return Err(CalibrationError::Manifest(format!(
                    "{}: exposure time must be non-negative, got {t}",
                    seq.path.display()
                )));
            }
        }
        Ok(())
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Header-level description of every sequence.
    pub fn describe(&self) -> Result<Vec<SequenceInfo>> {
        self.sequences
            .iter()
            .map(|seq| {
                let path = self.resolve(&seq.path);
                let exposure_time = seq.exposure_seconds()?;
                let (frames, width, height, instrument) = if Sequence::is_ser(&path) {
                    let reader = SerReader::open(&path)?;
                    let header = reader.header;
                    (
                        header.frame_count as usize,
                        header.width as usize,
                        header.height as usize,
                        Some(header.instrument).filter(|s| !s.is_empty()),
                    )
                } else {
                    let (w, h) = image::image_dimensions(&path)?;
                    (1, w as usize, h as usize, None)
                };
                let housekeeping = seq
                    .housekeeping
                    .as_ref()
                    .map(Housekeeping::calibrate)
                    .transpose()?;
                Ok(SequenceInfo {
                    path,
                    exposure_time,
                    frames,
                    width,
                    height,
                    instrument,
                    housekeeping,
                })
            })
            .collect()
    }

    /// Decode every frame of every sequence, in manifest order.
    pub fn load_frames(&self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        for seq in &self.sequences {
            let path = self.resolve(&seq.path);
            let exposure_time = seq.exposure_seconds()?;
            if exposure_time > 0.0 && !self.model.exposure_in_range(exposure_time) {
                warn!(
                    path = %path.display(),
                    exposure_time,
                    "Exposure outside the camera's supported range"
                );
            }

            let loaded: Vec<Frame> = if Sequence::is_ser(&path) {
                let reader = SerReader::open(&path)?;
                reader
                    .frames(exposure_time, &self.camera)
                    .collect::<Result<_>>()?
            } else {
                vec![load_counts(&path, exposure_time, &self.camera)?]
            };
            debug!(path = %path.display(), frames = loaded.len(), exposure_time, "Loaded sequence");

            for frame in loaded {
                let frame = match &seq.housekeeping {
                    Some(hk) => {
                        let metadata = FrameMetadata {
                            housekeeping: Some(hk.clone()),
                            ..frame.metadata().clone()
                        };
                        frame.with_metadata(metadata)
                    }
                    None => frame,
                };
                let frame = if self.crop_active {
                    active_frame(&frame, &self.model.sensor)?
                } else {
                    frame
                };
                frames.push(frame);
            }
        }
        Ok(frames)
    }
}
