use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::error::{CalibrationError, Result};
use crate::group::GroupingMode;
use crate::noise::Reduction;
use crate::ptc::PtcConfig;

/// Everything the calibration pipeline needs besides the frames.
///
/// Passed explicitly into every run; there is no global configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Grouping mode; also selects the noise estimator.
    #[serde(default)]
    pub grouping: GroupingMode,
    #[serde(default)]
    pub reduction: Reduction,
    #[serde(default)]
    pub ptc: PtcConfig,
}

impl CalibrationConfig {
    /// Defaults, saturating at the full scale of `camera`'s ADC.
    pub fn for_camera(camera: &Camera) -> Self {
        let mut config = Self::default();
        config.ptc.saturation_level = camera.saturation_level();
        config
    }

    /// Parse a TOML config. A file that does not set `ptc.saturation_level`
    /// gets the full scale of `camera`'s ADC.
    pub fn from_toml_for_camera(text: &str, camera: &Camera) -> Result<Self> {
        let table: toml::Table =
            toml::from_str(text).map_err(|e| CalibrationError::Config(e.to_string()))?;
        let mut config: Self =
            toml::from_str(text).map_err(|e| CalibrationError::Config(e.to_string()))?;

        let sets_level = table
            .get("ptc")
            .and_then(|ptc| ptc.get("saturation_level"))
            .is_some();
        if !sets_level {
            config.ptc.saturation_level = camera.saturation_level();
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.ptc.validate()
    }
}
