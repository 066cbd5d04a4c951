use ndarray::{Array2, ArrayView2};
use serde::Serialize;
use tracing::info;

use crate::error::{CalibrationError, Result};
use crate::group::FrameSet;
use crate::noise::sample_moments;

/// Fixed-pattern offset and read noise derived from zero-exposure frames.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BiasMap {
    /// Per-pixel mean of the bias frames, in counts.
    pub offset: Array2<f64>,
    /// Per-pixel standard deviation across the bias frames, in counts.
    pub noise: Array2<f64>,
    /// `sqrt(mean per-pixel variance)`, in counts.
    pub read_noise: f64,
    pub frame_count: usize,
}

impl BiasMap {
    /// Mean offset over the whole map.
    pub fn mean_offset(&self) -> f64 {
        self.offset.mean().unwrap_or(0.0)
    }

    pub fn dim(&self) -> (usize, usize) {
        self.offset.dim()
    }
}

/// Estimate the bias map from the zero-exposure frames of `set`.
pub fn estimate_bias(set: &FrameSet<'_>) -> Result<BiasMap> {
    let frames = set.bias_level().map(|l| set.frames(l)).unwrap_or_default();
    if frames.len() < 2 {
        return Err(CalibrationError::InsufficientData(format!(
            "bias estimation needs at least 2 zero-exposure frames, got {}",
            frames.len()
        )));
    }

    let views: Vec<ArrayView2<'_, u16>> = frames.iter().map(|f| f.data()).collect();
    let moments = sample_moments(&views)?;

    let read_noise = moments.variance.mean().unwrap_or(0.0).sqrt();
    let noise = moments.variance.mapv(f64::sqrt);

    let bias = BiasMap {
        offset: moments.mean,
        noise,
        read_noise,
        frame_count: moments.count,
    };

    info!(
        frames = bias.frame_count,
        mean_offset = bias.mean_offset(),
        read_noise_counts = bias.read_noise,
        "Bias estimated"
    );
    Ok(bias)
}
