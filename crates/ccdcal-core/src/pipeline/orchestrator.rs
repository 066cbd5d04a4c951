use tracing::info;

use crate::bias::{estimate_bias, BiasMap};
use crate::error::Result;
use crate::frame::Frame;
use crate::group::aggregate;
use crate::noise::{estimate_levels_with_progress, VarianceEstimate};
use crate::ptc::{fit_ptc, PtcPoint};
use crate::result::CalibrationResult;

use super::config::CalibrationConfig;
use super::types::{NoOpReporter, PipelineStage, ProgressReporter};

/// Turn level estimates into bias-subtracted transfer curve points.
pub fn transfer_points(estimates: &[VarianceEstimate], bias: &BiasMap) -> Vec<PtcPoint> {
    let offset = bias.mean_offset();
    estimates
        .iter()
        .map(|e| PtcPoint {
            exposure_time: Some(e.exposure_time()),
            mean: e.mean().value() - offset,
            variance: e.variance().value(),
            pedestal: offset,
        })
        .collect()
}

/// Run the full calibration pipeline with a thread-safe progress reporter.
///
/// Any failure is returned wrapped with the stage that raised it; no partial
/// result is produced.
pub fn run_calibration_reported(
    frames: &[Frame],
    config: &CalibrationConfig,
    reporter: &dyn ProgressReporter,
) -> Result<CalibrationResult> {
    config
        .validate()
        .map_err(|e| e.at_stage(PipelineStage::TransferCurveFit))?;

    reporter.begin_stage(PipelineStage::Grouping, Some(frames.len()));
    let set =
        aggregate(frames, config.grouping).map_err(|e| e.at_stage(PipelineStage::Grouping))?;
    let (h, w) = set.dim();
    info!(
        frames = set.total_frames(),
        levels = set.levels().len(),
        width = w,
        height = h,
        camera = %set.camera(),
        mode = %set.mode(),
        "Grouped calibration frames"
    );
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::BiasEstimation, None);
    let bias = estimate_bias(&set.bias_only())
        .map_err(|e| e.at_stage(PipelineStage::BiasEstimation))?;
    reporter.finish_stage();

    let method = set.variance_method();
    let signal_levels = set.signal_levels().count();
    reporter.begin_stage(PipelineStage::VarianceEstimation, Some(signal_levels));
    let estimates = estimate_levels_with_progress(&set, method, config.reduction, |done| {
        reporter.advance(done)
    })
    .map_err(|e| e.at_stage(PipelineStage::VarianceEstimation))?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::TransferCurveFit, Some(estimates.len()));
    let points = transfer_points(&estimates, &bias);
    let ptc =
        fit_ptc(&points, &config.ptc).map_err(|e| e.at_stage(PipelineStage::TransferCurveFit))?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Assembly, None);
    let result = CalibrationResult::new(
        set.camera().clone(),
        method,
        config.reduction,
        ptc,
        bias,
        estimates,
    );
    reporter.finish_stage();

    info!(
        gain = result.gain(),
        read_noise = result.read_noise(),
        excluded = result.regime_mask().iter().filter(|&&m| m).count(),
        "Calibration complete"
    );
    Ok(result)
}

/// Run the full calibration pipeline.
pub fn run_calibration(frames: &[Frame], config: &CalibrationConfig) -> Result<CalibrationResult> {
    run_calibration_reported(frames, config, &NoOpReporter)
}
