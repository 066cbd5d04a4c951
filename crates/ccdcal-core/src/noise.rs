use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::{Array, Array2, ArrayView, ArrayView2, Dimension, Zip};
use num_traits::AsPrimitive;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{PARALLEL_LEVEL_THRESHOLD, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{CalibrationError, Result};
use crate::group::{ExposureLevel, FrameSet};

/// Noise estimation strategy.
///
/// Each variant is a pure function of a frame set and one of its levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarianceMethod {
    /// Variance of `A - B` over same-exposure pairs; fixed pattern cancels.
    #[default]
    PairwiseDifference,
    /// Unbiased sample variance across a stack of N >= 2 frames.
    MultiFrame,
}

impl std::fmt::Display for VarianceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PairwiseDifference => write!(f, "Pairwise difference"),
            Self::MultiFrame => write!(f, "Multi-frame"),
        }
    }
}

/// Whether estimates are reported per pixel or collapsed to one number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reduction {
    #[default]
    Global,
    PerPixel,
}

impl std::fmt::Display for Reduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => write!(f, "Global"),
            Self::PerPixel => write!(f, "Per pixel"),
        }
    }
}

/// A scalar or per-pixel statistic.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Statistic {
    Scalar(f64),
    Map(Array2<f64>),
}

impl Statistic {
    /// The scalar value, or the mean over the map.
    pub fn value(&self) -> f64 {
        match self {
            Self::Scalar(v) => *v,
            Self::Map(m) => m.mean().unwrap_or(0.0),
        }
    }

    pub fn as_map(&self) -> Option<&Array2<f64>> {
        match self {
            Self::Scalar(_) => None,
            Self::Map(m) => Some(m),
        }
    }

    fn min(&self) -> f64 {
        match self {
            Self::Scalar(v) => *v,
            Self::Map(m) => m.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

/// Mean and variance of one exposure level.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VarianceEstimate {
    exposure_time: f64,
    mean: Statistic,
    variance: Statistic,
    sample_count: usize,
}

impl VarianceEstimate {
    pub fn new(
        exposure_time: f64,
        mean: Statistic,
        variance: Statistic,
        sample_count: usize,
    ) -> Result<Self> {
        if sample_count < 2 {
            return Err(CalibrationError::InsufficientData(format!(
                "variance needs at least 2 samples, got {sample_count}"
            )));
        }
        let min = variance.min();
        if min.is_nan() || min < 0.0 {
            return Err(CalibrationError::Value(format!(
                "variance must be non-negative, got {min}"
            )));
        }
        Ok(Self {
            exposure_time,
            mean,
            variance,
            sample_count,
        })
    }

    pub fn exposure_time(&self) -> f64 {
        self.exposure_time
    }

    pub fn mean(&self) -> &Statistic {
        &self.mean
    }

    pub fn variance(&self) -> &Statistic {
        &self.variance
    }

    /// Number of frames that contributed.
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
}

/// Element-wise mean and variance over a set of equally shaped arrays.
#[derive(Clone, Debug, PartialEq)]
pub struct Moments<D: Dimension> {
    pub mean: Array<f64, D>,
    pub variance: Array<f64, D>,
    pub count: usize,
}

fn check_shapes<A, D: Dimension>(views: &[&ArrayView<'_, A, D>]) -> Result<()> {
    let shape = views[0].shape();
    if let Some(bad) = views.iter().find(|v| v.shape() != shape) {
        return Err(CalibrationError::Shape(format!(
            "cannot combine arrays of shape {:?} and {:?}",
            shape,
            bad.shape()
        )));
    }
    Ok(())
}

/// Unbiased element-wise sample variance across a stack (Welford).
///
/// Works at any rank: a stack of rank-0 arrays gives scalar moments, a
/// stack of frames gives per-pixel maps.
pub fn sample_moments<A, D>(stack: &[ArrayView<'_, A, D>]) -> Result<Moments<D>>
where
    A: AsPrimitive<f64> + Send + Sync,
    D: Dimension,
{
    let n = stack.len();
    if n < 2 {
        return Err(CalibrationError::InsufficientData(format!(
            "sample variance needs at least 2 frames, got {n}"
        )));
    }
    check_shapes(&stack.iter().collect::<Vec<_>>())?;

    let dim = stack[0].raw_dim();
    let mut mean = Array::<f64, D>::zeros(dim.clone());
    let mut m2 = Array::<f64, D>::zeros(dim);
    let parallel = mean.len() >= PARALLEL_PIXEL_THRESHOLD;

    for (k, view) in stack.iter().enumerate() {
        let k1 = (k + 1) as f64;
        let update = |m: &mut f64, s: &mut f64, x: &A| {
            let x: f64 = x.as_();
            let delta = x - *m;
            *m += delta / k1;
            *s += delta * (x - *m);
        };
        let zip = Zip::from(&mut mean).and(&mut m2).and(view);
        if parallel {
            zip.par_for_each(update);
        } else {
            zip.for_each(update);
        }
    }

    m2 /= (n - 1) as f64;
    Ok(Moments {
        mean,
        variance: m2,
        count: n,
    })
}

/// Element-wise pair-difference moments.
///
/// For each pair the mean is `(a + b) / 2` and the variance `(a - b)^2 / 2`;
/// both are averaged over pairs. Swapping the members of a pair does not
/// change the result.
pub fn pair_moments<A, D>(
    pairs: &[(ArrayView<'_, A, D>, ArrayView<'_, A, D>)],
) -> Result<Moments<D>>
where
    A: AsPrimitive<f64> + Send + Sync,
    D: Dimension,
{
    if pairs.is_empty() {
        return Err(CalibrationError::InsufficientData(
            "pair-difference variance needs at least one pair".into(),
        ));
    }
    let views: Vec<_> = pairs.iter().flat_map(|(a, b)| [a, b]).collect();
    check_shapes(&views)?;

    let dim = pairs[0].0.raw_dim();
    let mut mean = Array::<f64, D>::zeros(dim.clone());
    let mut variance = Array::<f64, D>::zeros(dim);
    let np = pairs.len() as f64;

    for (a, b) in pairs {
        Zip::from(&mut mean)
            .and(&mut variance)
            .and(a)
            .and(b)
            .for_each(|m, v, x, y| {
                let (x, y): (f64, f64) = (x.as_(), y.as_());
                *m += 0.5 * (x + y) / np;
                *v += 0.5 * (x - y) * (x - y) / np;
            });
    }

    Ok(Moments {
        mean,
        variance,
        count: 2 * pairs.len(),
    })
}

/// Mean of `(a + b) / 2` and unbiased variance of `a - b` over all elements.
pub fn difference_variance<A, D>(
    a: &ArrayView<'_, A, D>,
    b: &ArrayView<'_, A, D>,
) -> Result<(f64, f64)>
where
    A: AsPrimitive<f64>,
    D: Dimension,
{
    check_shapes(&[a, b])?;
    let n = a.len();
    if n < 2 {
        return Err(CalibrationError::InsufficientData(format!(
            "difference variance needs at least 2 pixels, got {n}"
        )));
    }

    let mut sum = 0.0f64;
    let mut diff_sum = 0.0f64;
    Zip::from(a).and(b).for_each(|x, y| {
        let (x, y): (f64, f64) = (x.as_(), y.as_());
        sum += x + y;
        diff_sum += x - y;
    });
    let diff_mean = diff_sum / n as f64;

    let mut sq_sum = 0.0f64;
    Zip::from(a).and(b).for_each(|x, y| {
        let (x, y): (f64, f64) = (x.as_(), y.as_());
        let d = x - y - diff_mean;
        sq_sum += d * d;
    });

    Ok((0.5 * sum / n as f64, sq_sum / (n - 1) as f64))
}

impl VarianceMethod {
    /// Estimate mean and variance of one exposure level of `set`.
    pub fn estimate(
        &self,
        set: &FrameSet<'_>,
        level: &ExposureLevel,
        reduction: Reduction,
    ) -> Result<VarianceEstimate> {
        match self {
            Self::PairwiseDifference => estimate_pairwise(set, level, reduction),
            Self::MultiFrame => estimate_multi_frame(set, level, reduction),
        }
    }
}

fn estimate_pairwise(
    set: &FrameSet<'_>,
    level: &ExposureLevel,
    reduction: Reduction,
) -> Result<VarianceEstimate> {
    let pairs = set.pairs(level)?;
    if pairs.is_empty() {
        return Err(CalibrationError::InsufficientData(format!(
            "no frame pairs at exposure {} s",
            level.exposure_time
        )));
    }
    let views: Vec<(ArrayView2<'_, u16>, ArrayView2<'_, u16>)> =
        pairs.iter().map(|(a, b)| (a.data(), b.data())).collect();

    match reduction {
        Reduction::Global => {
            let mut mean = 0.0f64;
            let mut variance = 0.0f64;
            for (a, b) in &views {
                let (m, diff_var) = difference_variance(a, b)?;
                mean += m;
                variance += 0.5 * diff_var;
            }
            let np = views.len() as f64;
            VarianceEstimate::new(
                level.exposure_time,
                Statistic::Scalar(mean / np),
                Statistic::Scalar(variance / np),
                2 * views.len(),
            )
        }
        Reduction::PerPixel => {
            let moments = pair_moments(&views)?;
            VarianceEstimate::new(
                level.exposure_time,
                Statistic::Map(moments.mean),
                Statistic::Map(moments.variance),
                moments.count,
            )
        }
    }
}

fn estimate_multi_frame(
    set: &FrameSet<'_>,
    level: &ExposureLevel,
    reduction: Reduction,
) -> Result<VarianceEstimate> {
    let views: Vec<ArrayView2<'_, u16>> = set.frames(level).iter().map(|f| f.data()).collect();
    let moments = sample_moments(&views)?;
    let (mean, variance) = match reduction {
        Reduction::Global => (
            Statistic::Scalar(moments.mean.mean().unwrap_or(0.0)),
            Statistic::Scalar(moments.variance.mean().unwrap_or(0.0)),
        ),
        Reduction::PerPixel => (
            Statistic::Map(moments.mean),
            Statistic::Map(moments.variance),
        ),
    };
    VarianceEstimate::new(level.exposure_time, mean, variance, moments.count)
}

/// Estimate every non-zero exposure level of `set`, in ascending exposure.
pub fn estimate_levels(
    set: &FrameSet<'_>,
    method: VarianceMethod,
    reduction: Reduction,
) -> Result<Vec<VarianceEstimate>> {
    estimate_levels_with_progress(set, method, reduction, |_| {})
}

/// Estimate every non-zero level with per-level progress reporting.
///
/// Levels are independent, so they run in parallel once there are
/// [`PARALLEL_LEVEL_THRESHOLD`] of them. Calls `on_progress(levels_done)`
/// as each level finishes; output order is always ascending exposure.
pub fn estimate_levels_with_progress(
    set: &FrameSet<'_>,
    method: VarianceMethod,
    reduction: Reduction,
    on_progress: impl Fn(usize) + Send + Sync,
) -> Result<Vec<VarianceEstimate>> {
    let levels: Vec<&ExposureLevel> = set.signal_levels().collect();
    debug!(
        levels = levels.len(),
        method = %method,
        reduction = %reduction,
        "Estimating level variances"
    );

    let done = AtomicUsize::new(0);
    let run = |level: &ExposureLevel| {
        let estimate = method.estimate(set, level, reduction);
        on_progress(done.fetch_add(1, Ordering::Relaxed) + 1);
        estimate
    };

    if levels.len() >= PARALLEL_LEVEL_THRESHOLD {
        levels.par_iter().map(|&level| run(level)).collect()
    } else {
        levels.iter().map(|&level| run(level)).collect()
    }
}
