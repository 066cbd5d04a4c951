use ndarray::{Array2, ArrayView2, Zip};
use serde::Serialize;

use crate::bias::BiasMap;
use crate::error::{CalibrationError, Result};
use crate::frame::CameraId;
use crate::noise::{Reduction, VarianceEstimate, VarianceMethod};
use crate::ptc::{FitMethod, PtcFit, Regime};

/// Gain and bias calibration for one camera and readout mode.
///
/// Owns every derived statistic; nothing aliases the input frames.
#[derive(Clone, Debug)]
pub struct CalibrationResult {
    camera: CameraId,
    method: VarianceMethod,
    reduction: Reduction,
    ptc: PtcFit,
    bias: BiasMap,
    estimates: Vec<VarianceEstimate>,
}

impl CalibrationResult {
    pub fn new(
        camera: CameraId,
        method: VarianceMethod,
        reduction: Reduction,
        ptc: PtcFit,
        bias: BiasMap,
        estimates: Vec<VarianceEstimate>,
    ) -> Self {
        Self {
            camera,
            method,
            reduction,
            ptc,
            bias,
            estimates,
        }
    }

    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    /// Electrons per count.
    pub fn gain(&self) -> f64 {
        self.ptc.gain
    }

    /// Read noise in electrons, from the transfer curve intercept.
    pub fn read_noise(&self) -> f64 {
        self.ptc.read_noise
    }

    pub fn bias_map(&self) -> &BiasMap {
        &self.bias
    }

    pub fn ptc(&self) -> &PtcFit {
        &self.ptc
    }

    pub fn regime_mask(&self) -> Vec<bool> {
        self.ptc.regime_mask()
    }

    pub fn fit_residuals(&self) -> &[f64] {
        &self.ptc.residuals
    }

    /// Per-level estimates in ascending exposure order.
    pub fn estimates(&self) -> &[VarianceEstimate] {
        &self.estimates
    }

    pub fn method(&self) -> VarianceMethod {
        self.method
    }

    /// `gain * (counts - bias)` for a raw frame of the calibrated shape.
    pub fn to_electrons(&self, counts: ArrayView2<'_, u16>) -> Result<Array2<f64>> {
        if counts.dim() != self.bias.dim() {
            let (bh, bw) = self.bias.dim();
            return Err(CalibrationError::Shape(format!(
                "frame is {}x{}, calibration is {bh}x{bw}",
                counts.nrows(),
                counts.ncols()
            )));
        }
        let gain = self.gain();
        let mut electrons = Array2::<f64>::zeros(counts.dim());
        Zip::from(&mut electrons)
            .and(&counts)
            .and(&self.bias.offset)
            .for_each(|e, &c, &b| *e = gain * (f64::from(c) - b));
        Ok(electrons)
    }

    /// Photon counts given the mean number of electrons each photon frees.
    pub fn to_photons(
        &self,
        counts: ArrayView2<'_, u16>,
        electrons_per_photon: f64,
    ) -> Result<Array2<f64>> {
        if !(electrons_per_photon.is_finite() && electrons_per_photon > 0.0) {
            return Err(CalibrationError::Value(format!(
                "electrons per photon must be positive, got {electrons_per_photon}"
            )));
        }
        Ok(self.to_electrons(counts)? / electrons_per_photon)
    }

    /// Scalar view of the result, suitable for reports.
    pub fn summary(&self) -> CalibrationSummary {
        let levels = self
            .ptc
            .points
            .iter()
            .zip(&self.ptc.regimes)
            .zip(&self.ptc.residuals)
            .zip(&self.estimates)
            .map(|(((point, regime), residual), estimate)| LevelSummary {
                exposure_time: estimate.exposure_time(),
                frames: estimate.sample_count(),
                mean: point.mean,
                variance: point.variance,
                residual: *residual,
                regime: *regime,
            })
            .collect();

        CalibrationSummary {
            method: self.method,
            reduction: self.reduction,
            fit_method: self.ptc.method,
            gain: self.gain(),
            read_noise: self.read_noise(),
            relative_rss: self.ptc.relative_rss,
            bias_frames: self.bias.frame_count,
            bias_mean: self.bias.mean_offset(),
            bias_read_noise_counts: self.bias.read_noise,
            bias_read_noise_electrons: self.bias.read_noise * self.gain(),
            camera: self.camera.clone(),
            levels,
        }
    }
}

/// One row of the transfer-curve table in a [`CalibrationSummary`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LevelSummary {
    pub exposure_time: f64,
    pub frames: usize,
    pub mean: f64,
    pub variance: f64,
    pub residual: f64,
    pub regime: Regime,
}

/// Scalar calibration report; tables are kept last so it serializes to TOML.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CalibrationSummary {
    pub method: VarianceMethod,
    pub reduction: Reduction,
    pub fit_method: FitMethod,
    pub gain: f64,
    pub read_noise: f64,
    pub relative_rss: f64,
    pub bias_frames: usize,
    pub bias_mean: f64,
    pub bias_read_noise_counts: f64,
    pub bias_read_noise_electrons: f64,
    pub camera: CameraId,
    pub levels: Vec<LevelSummary>,
}
