use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::consts::{DEFAULT_MAX_RELATIVE_RSS, DEFAULT_SATURATION_FRACTION, EPSILON};
use crate::error::{CalibrationError, Result};

/// One (mean, variance) sample of the photon transfer curve, in counts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PtcPoint {
    /// Exposure time in seconds, when the point came from a frame ladder.
    pub exposure_time: Option<f64>,
    /// Bias-subtracted mean signal.
    pub mean: f64,
    pub variance: f64,
    /// Bias level removed from `mean`; the ADC clips `mean + pedestal`.
    #[serde(default)]
    pub pedestal: f64,
}

impl PtcPoint {
    pub fn new(mean: f64, variance: f64) -> Self {
        Self {
            exposure_time: None,
            mean,
            variance,
            pedestal: 0.0,
        }
    }

    /// Mean signal as the ADC saw it, before bias subtraction.
    pub fn raw_mean(&self) -> f64 {
        self.mean + self.pedestal
    }
}

/// Regression used for the linear part of the curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    /// Ordinary least squares.
    #[default]
    Ordinary,
    /// Least squares weighted by `1 / variance^2`, the inverse variance of
    /// a sample variance under Gaussian noise.
    Weighted,
}

impl std::fmt::Display for FitMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ordinary => write!(f, "Ordinary least squares"),
            Self::Weighted => write!(f, "Weighted least squares"),
        }
    }
}

/// Parameters for the photon transfer curve fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtcConfig {
    /// Full-scale ADC output, in raw counts (bias pedestal included).
    pub saturation_level: f64,
    /// Points with raw mean above `saturation_fraction * saturation_level` are
    /// excluded (default: 0.9).
    pub saturation_fraction: f64,
    /// Largest accepted `sum(residual^2) / sum(variance^2)` over the fitted
    /// points (default: 0.01).
    pub max_relative_rss: f64,
    pub method: FitMethod,
}

impl Default for PtcConfig {
    fn default() -> Self {
        Self {
            saturation_level: 65535.0,
            saturation_fraction: DEFAULT_SATURATION_FRACTION,
            max_relative_rss: DEFAULT_MAX_RELATIVE_RSS,
            method: FitMethod::Ordinary,
        }
    }
}

impl PtcConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.saturation_level.is_finite() && self.saturation_level > 0.0) {
            return Err(CalibrationError::Value(format!(
                "saturation level must be positive, got {}",
                self.saturation_level
            )));
        }
        if !(self.saturation_fraction > 0.0 && self.saturation_fraction <= 1.0) {
            return Err(CalibrationError::Value(format!(
                "saturation fraction must be in (0, 1], got {}",
                self.saturation_fraction
            )));
        }
        if !(self.max_relative_rss > 0.0) {
            return Err(CalibrationError::Value(format!(
                "fit tolerance must be positive, got {}",
                self.max_relative_rss
            )));
        }
        Ok(())
    }

    /// Mean signal above which points are treated as saturated.
    pub fn saturation_threshold(&self) -> f64 {
        self.saturation_fraction * self.saturation_level
    }
}

/// Why a point was or was not used in the fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    Linear,
    /// Mean above the saturation threshold.
    Saturated,
    /// Variance below that of a lower-signal point.
    NonMonotonic,
}

impl Regime {
    pub fn is_excluded(&self) -> bool {
        !matches!(self, Self::Linear)
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Saturated => write!(f, "saturated"),
            Self::NonMonotonic => write!(f, "non-monotonic"),
        }
    }
}

/// Result of a photon transfer curve fit.
///
/// `points`, `regimes` and `residuals` are aligned with the fitter input.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PtcFit {
    /// Electrons per count.
    pub gain: f64,
    /// Read noise in electrons.
    pub read_noise: f64,
    pub slope: f64,
    pub intercept: f64,
    pub relative_rss: f64,
    pub method: FitMethod,
    pub points: Vec<PtcPoint>,
    pub regimes: Vec<Regime>,
    /// `variance - model(mean)` for every input point.
    pub residuals: Vec<f64>,
}

impl PtcFit {
    /// True for every point excluded from the fit.
    pub fn regime_mask(&self) -> Vec<bool> {
        self.regimes.iter().map(Regime::is_excluded).collect()
    }

    pub fn linear_count(&self) -> usize {
        self.regimes.iter().filter(|r| !r.is_excluded()).count()
    }

    /// Variance the fitted model predicts at `mean`.
    pub fn predict(&self, mean: f64) -> f64 {
        self.slope * mean + self.intercept
    }
}

/// Classify each point, in input order.
///
/// Points are visited by ascending mean. A point is saturated when its raw
/// mean, pedestal included, exceeds the threshold, and non-monotonic when its variance is below the
/// largest variance of any lower-signal linear point.
pub fn classify_points(points: &[PtcPoint], config: &PtcConfig) -> Vec<Regime> {
    let threshold = config.saturation_threshold();
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| points[a].mean.total_cmp(&points[b].mean));

    let mut regimes = vec![Regime::Linear; points.len()];
    let mut max_variance = f64::NEG_INFINITY;
    for i in order {
        let p = &points[i];
        if p.raw_mean() > threshold {
            regimes[i] = Regime::Saturated;
        } else if p.variance < max_variance {
            regimes[i] = Regime::NonMonotonic;
        } else {
            max_variance = p.variance;
        }
    }
    regimes
}

/// Fit `variance = mean / gain + read_noise^2 / gain^2` to the linear part
/// of a photon transfer curve.
pub fn fit_ptc(points: &[PtcPoint], config: &PtcConfig) -> Result<PtcFit> {
    config.validate()?;
    if let Some(bad) = points
        .iter()
        .find(|p| !p.mean.is_finite() || !p.variance.is_finite() || p.variance < 0.0)
    {
        return Err(CalibrationError::Value(format!(
            "transfer curve point (mean {}, variance {}) is not physical",
            bad.mean, bad.variance
        )));
    }

    let regimes = classify_points(points, config);
    let (xs, ys): (Vec<f64>, Vec<f64>) = points
        .iter()
        .zip(&regimes)
        .filter(|(_, r)| !r.is_excluded())
        .map(|(p, _)| (p.mean, p.variance))
        .unzip();

    let excluded = points.len() - xs.len();
    if excluded > 0 {
        debug!(excluded, "Excluded non-linear transfer curve points");
    }
    if xs.len() < 2 {
        return Err(CalibrationError::InsufficientData(format!(
            "{} linear-regime points remain after exclusion, need at least 2",
            xs.len()
        )));
    }

    let weights: Vec<f64> = match config.method {
        FitMethod::Ordinary => vec![1.0; xs.len()],
        FitMethod::Weighted => ys.iter().map(|&v| 1.0 / v.max(EPSILON).powi(2)).collect(),
    };
    let (slope, intercept) = weighted_line_fit(&xs, &ys, &weights)?;

    if !(slope > 0.0) {
        return Err(CalibrationError::FitQuality(format!(
            "fitted slope {slope:.6e} is not positive; gain would be non-physical"
        )));
    }
    let gain = 1.0 / slope;

    let read_noise = if intercept >= 0.0 {
        gain * intercept.sqrt()
    } else {
        warn!(intercept, "Negative transfer curve intercept, read noise set to 0");
        0.0
    };

    let residuals: Vec<f64> = points
        .iter()
        .map(|p| p.variance - (slope * p.mean + intercept))
        .collect();

    let (rss, norm) = residuals
        .iter()
        .zip(points)
        .zip(&regimes)
        .filter(|(_, r)| !r.is_excluded())
        .fold((0.0f64, 0.0f64), |(rss, norm), ((r, p), _)| {
            (rss + r * r, norm + p.variance * p.variance)
        });
    let relative_rss = if norm > 0.0 { rss / norm } else { 0.0 };

    if relative_rss > config.max_relative_rss {
        return Err(CalibrationError::FitQuality(format!(
            "relative residual {relative_rss:.3e} exceeds tolerance {:.3e}",
            config.max_relative_rss
        )));
    }

    info!(
        gain,
        read_noise,
        points = xs.len(),
        excluded,
        relative_rss,
        "Transfer curve fitted"
    );

    Ok(PtcFit {
        gain,
        read_noise,
        slope,
        intercept,
        relative_rss,
        method: config.method,
        points: points.to_vec(),
        regimes,
        residuals,
    })
}

/// Weighted least-squares line through `(xs, ys)`, returning (slope, intercept).
///
/// Uses centred sums so large means do not swamp the variance term.
fn weighted_line_fit(xs: &[f64], ys: &[f64], weights: &[f64]) -> Result<(f64, f64)> {
    let w_sum: f64 = weights.iter().sum();
    let x_bar = xs.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>() / w_sum;
    let y_bar = ys.iter().zip(weights).map(|(y, w)| y * w).sum::<f64>() / w_sum;

    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    for ((x, y), w) in xs.iter().zip(ys).zip(weights) {
        let dx = x - x_bar;
        sxx += w * dx * dx;
        sxy += w * dx * (y - y_bar);
    }

    if sxx <= EPSILON * w_sum * x_bar.abs().max(1.0).powi(2) {
        return Err(CalibrationError::FitQuality(
            "transfer curve means do not span a range; slope is undefined".into(),
        ));
    }

    let slope = sxy / sxx;
    Ok((slope, y_bar - slope * x_bar))
}
