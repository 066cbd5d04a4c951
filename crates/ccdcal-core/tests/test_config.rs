use ccdcal_core::camera::Camera;
use ccdcal_core::error::CalibrationError;
use ccdcal_core::group::GroupingMode;
use ccdcal_core::noise::Reduction;
use ccdcal_core::pipeline::config::CalibrationConfig;
use ccdcal_core::pipeline::PipelineStage;
use ccdcal_core::ptc::{FitMethod, PtcConfig};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_config_defaults() {
    let config = CalibrationConfig::default();
    assert_eq!(config.grouping, GroupingMode::Pairwise);
    assert_eq!(config.reduction, Reduction::Global);
    assert_eq!(config.ptc.method, FitMethod::Ordinary);
    assert_eq!(config.ptc.saturation_level, 65535.0);
    assert_eq!(config.ptc.saturation_fraction, 0.9);
    assert_eq!(config.ptc.max_relative_rss, 0.01);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_toml_round_trip() {
    let config = CalibrationConfig {
        grouping: GroupingMode::Ladder,
        reduction: Reduction::PerPixel,
        ptc: PtcConfig {
            method: FitMethod::Weighted,
            saturation_level: 4095.0,
            ..Default::default()
        },
    };
    let text = toml::to_string_pretty(&config).unwrap();
    let back: CalibrationConfig = toml::from_str(&text).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let config: CalibrationConfig = toml::from_str(
        r#"
        grouping = "Ladder"

        [ptc]
        saturation_fraction = 0.75
        "#,
    )
    .unwrap();
    assert_eq!(config.grouping, GroupingMode::Ladder);
    assert_eq!(config.reduction, Reduction::Global);
    assert_eq!(config.ptc.saturation_fraction, 0.75);
    assert_eq!(config.ptc.saturation_level, 65535.0);
}

#[test]
fn test_empty_toml_is_default() {
    let config: CalibrationConfig = toml::from_str("").unwrap();
    assert_eq!(config, CalibrationConfig::default());
}

// ---------------------------------------------------------------------------
// Camera full scale
// ---------------------------------------------------------------------------

fn camera_12bit() -> Camera {
    Camera {
        adc_bits: 12,
        ..Default::default()
    }
}

#[test]
fn test_for_camera_uses_adc_full_scale() {
    let config = CalibrationConfig::for_camera(&camera_12bit());
    assert_eq!(config.ptc.saturation_level, 4095.0);
    assert_eq!(config.ptc.saturation_fraction, 0.9);
}

#[test]
fn test_config_file_without_level_uses_camera() {
    let text = "grouping = \"Ladder\"\n\n[ptc]\nsaturation_fraction = 0.8\n";
    let config = CalibrationConfig::from_toml_for_camera(text, &camera_12bit()).unwrap();
    assert_eq!(config.grouping, GroupingMode::Ladder);
    assert_eq!(config.ptc.saturation_fraction, 0.8);
    assert_eq!(config.ptc.saturation_level, 4095.0);

    let config = CalibrationConfig::from_toml_for_camera("", &camera_12bit()).unwrap();
    assert_eq!(config.ptc.saturation_level, 4095.0);
}

#[test]
fn test_config_file_level_wins_over_camera() {
    let text = "[ptc]\nsaturation_level = 3000.0\n";
    let config = CalibrationConfig::from_toml_for_camera(text, &camera_12bit()).unwrap();
    assert_eq!(config.ptc.saturation_level, 3000.0);
}

#[test]
fn test_malformed_config_file() {
    let err = CalibrationConfig::from_toml_for_camera("[ptc\n", &Camera::default()).unwrap_err();
    assert!(matches!(err, CalibrationError::Config(_)));
}

#[test]
fn test_validate_rejects_bad_fraction() {
    let mut config = CalibrationConfig::default();
    config.ptc.saturation_fraction = 1.5;
    assert!(matches!(config.validate(), Err(CalibrationError::Value(_))));
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

#[test]
fn test_pipeline_stage_display() {
    assert_eq!(PipelineStage::Grouping.to_string(), "Grouping frames");
    assert_eq!(PipelineStage::BiasEstimation.to_string(), "Estimating bias");
    assert_eq!(PipelineStage::VarianceEstimation.to_string(), "Estimating variance");
    assert_eq!(PipelineStage::TransferCurveFit.to_string(), "Fitting transfer curve");
    assert_eq!(PipelineStage::Assembly.to_string(), "Assembling result");
}

#[test]
fn test_fit_method_display() {
    assert_eq!(FitMethod::Ordinary.to_string(), "Ordinary least squares");
    assert_eq!(FitMethod::Weighted.to_string(), "Weighted least squares");
}

#[test]
fn test_invalid_config_fails_before_grouping() {
    let mut config = CalibrationConfig::default();
    config.ptc.max_relative_rss = -1.0;
    let err = ccdcal_core::pipeline::run_calibration(&[], &config).unwrap_err();
    assert_eq!(err.stage(), Some(PipelineStage::TransferCurveFit));
    assert!(matches!(err.root_cause(), CalibrationError::Value(_)));
}
