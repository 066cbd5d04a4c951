use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CalibrationError, Result};
use crate::frame::{CameraId, Frame};
use crate::noise::VarianceMethod;

/// How an input sequence is partitioned into statistical units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupingMode {
    /// Same-exposure pairs for pair-difference noise estimation.
    #[default]
    Pairwise,
    /// One stack per distinct exposure time for a photon transfer curve.
    Ladder,
}

impl std::fmt::Display for GroupingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pairwise => write!(f, "Pairwise"),
            Self::Ladder => write!(f, "Ladder"),
        }
    }
}

/// All frames sharing one exposure time, by index into the source slice.
#[derive(Clone, Debug, PartialEq)]
pub struct ExposureLevel {
    pub exposure_time: f64,
    pub indices: Vec<usize>,
}

impl ExposureLevel {
    pub fn is_bias(&self) -> bool {
        self.exposure_time == 0.0
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// A read-only partition of a frame sequence into exposure levels.
///
/// Borrows the frames; only indices are stored. Levels are ordered by
/// ascending exposure time and every frame shares one shape and camera.
#[derive(Clone, Debug)]
pub struct FrameSet<'a> {
    frames: &'a [Frame],
    levels: Vec<ExposureLevel>,
    mode: GroupingMode,
    dim: (usize, usize),
    camera: &'a CameraId,
}

/// Group `frames` into a [`FrameSet`] according to `mode`.
pub fn aggregate(frames: &[Frame], mode: GroupingMode) -> Result<FrameSet<'_>> {
    let first = frames.first().ok_or_else(|| {
        CalibrationError::InsufficientData("no frames supplied".into())
    })?;

    for (i, frame) in frames.iter().enumerate().skip(1) {
        if frame.dim() != first.dim() {
            return Err(CalibrationError::Grouping(format!(
                "frame {i} is {}x{}, expected {}x{}",
                frame.height(),
                frame.width(),
                first.height(),
                first.width()
            )));
        }
        if frame.camera() != first.camera() {
            return Err(CalibrationError::Grouping(format!(
                "frame {i} comes from camera {}, expected {}",
                frame.camera(),
                first.camera()
            )));
        }
    }

    let levels = partition_by_exposure(frames);

    match mode {
        GroupingMode::Pairwise => {
            if let Some(odd) = levels.iter().find(|l| l.len() % 2 != 0) {
                return Err(CalibrationError::Grouping(format!(
                    "{} frames at exposure {} s cannot be split into pairs",
                    odd.len(),
                    odd.exposure_time
                )));
            }
        }
        GroupingMode::Ladder => {
            let signal = levels.iter().filter(|l| !l.is_bias()).count();
            if signal < 2 {
                return Err(CalibrationError::InsufficientData(format!(
                    "a transfer curve needs at least 2 non-zero exposure levels, got {signal}"
                )));
            }
            if !levels.iter().any(ExposureLevel::is_bias) {
                return Err(CalibrationError::InsufficientData(
                    "no zero-exposure frames for bias estimation".into(),
                ));
            }
        }
    }

    debug!(
        frames = frames.len(),
        levels = levels.len(),
        mode = %mode,
        "Grouped frames by exposure"
    );

    Ok(FrameSet {
        frames,
        levels,
        mode,
        dim: first.dim(),
        camera: first.camera(),
    })
}

/// Sort indices by exposure time (stable) and cut at each change.
fn partition_by_exposure(frames: &[Frame]) -> Vec<ExposureLevel> {
    let mut order: Vec<usize> = (0..frames.len()).collect();
    order.sort_by(|&a, &b| {
        frames[a]
            .exposure_time()
            .total_cmp(&frames[b].exposure_time())
    });

    let mut levels: Vec<ExposureLevel> = Vec::new();
    for i in order {
        let t = frames[i].exposure_time();
        match levels.last_mut() {
            Some(level) if level.exposure_time == t => level.indices.push(i),
            _ => levels.push(ExposureLevel {
                exposure_time: t,
                indices: vec![i],
            }),
        }
    }
    levels
}

impl<'a> FrameSet<'a> {
    pub fn mode(&self) -> GroupingMode {
        self.mode
    }

    /// The noise estimator this grouping was built for.
    pub fn variance_method(&self) -> VarianceMethod {
        match self.mode {
            GroupingMode::Pairwise => VarianceMethod::PairwiseDifference,
            GroupingMode::Ladder => VarianceMethod::MultiFrame,
        }
    }

    pub fn levels(&self) -> &[ExposureLevel] {
        &self.levels
    }

    /// The zero-exposure level, if any bias frames were supplied.
    pub fn bias_level(&self) -> Option<&ExposureLevel> {
        self.levels.iter().find(|l| l.is_bias())
    }

    /// Non-zero exposure levels in ascending exposure order.
    pub fn signal_levels(&self) -> impl Iterator<Item = &ExposureLevel> + '_ {
        self.levels.iter().filter(|l| !l.is_bias())
    }

    /// Frames of one level, in input order.
    pub fn frames(&self, level: &ExposureLevel) -> Vec<&'a Frame> {
        level.indices.iter().map(|&i| &self.frames[i]).collect()
    }

    /// Consecutive frame pairs of one level.
    pub fn pairs(&self, level: &ExposureLevel) -> Result<Vec<(&'a Frame, &'a Frame)>> {
        if level.len() % 2 != 0 {
            return Err(CalibrationError::Grouping(format!(
                "{} frames at exposure {} s cannot be split into pairs",
                level.len(),
                level.exposure_time
            )));
        }
        Ok(level
            .indices
            .chunks_exact(2)
            .map(|p| (&self.frames[p[0]], &self.frames[p[1]]))
            .collect())
    }

    /// A view holding only the zero-exposure frames.
    pub fn bias_only(&self) -> FrameSet<'a> {
        FrameSet {
            frames: self.frames,
            levels: self.bias_level().cloned().into_iter().collect(),
            mode: self.mode,
            dim: self.dim,
            camera: self.camera,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.levels.iter().map(ExposureLevel::len).sum()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn camera(&self) -> &'a CameraId {
        self.camera
    }
}
