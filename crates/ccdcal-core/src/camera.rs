use serde::{Deserialize, Serialize};

use crate::consts::{
    CCD230_BLANK_COLUMNS, CCD230_OVERSCAN_COLUMNS, CCD230_PIXEL_WIDTH_UM, CCD230_TAPS_X,
    CCD230_TAPS_Y, DEFAULT_ADC_BITS, EXPOSURE_SECONDS_PER_COUNT, FPGA_TEMPERATURE_FULL_SCALE,
    FPGA_VOLTAGE_FULL_SCALE, HOUSEKEEPING_ADC_COUNTS, KELVIN_OFFSET, MAX_ADC_BITS,
};
use crate::error::{CalibrationError, Result};

/// Readout geometry of an imaging sensor.
///
/// The sensor is read through `taps_x * taps_y` amplifiers. Each tap row
/// starts with `blank_columns` serial-register pixels that never saw light
/// and ends with `overscan_columns` pixels clocked past the active area.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub taps_x: usize,
    pub taps_y: usize,
    pub blank_columns: usize,
    pub overscan_columns: usize,
    /// Pixel pitch in micrometres.
    pub pixel_width_um: f64,
}

impl Sensor {
    /// The Teledyne e2v CCD230 used by the MSFC cameras.
    pub fn ccd230() -> Self {
        Self {
            taps_x: CCD230_TAPS_X,
            taps_y: CCD230_TAPS_Y,
            blank_columns: CCD230_BLANK_COLUMNS,
            overscan_columns: CCD230_OVERSCAN_COLUMNS,
            pixel_width_um: CCD230_PIXEL_WIDTH_UM,
        }
    }
}

impl Default for Sensor {
    fn default() -> Self {
        Self::ccd230()
    }
}

/// A camera: a sensor plus the electronics and timing around it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub sensor: Sensor,
    /// Nominal conversion factor (electrons per count), if already known.
    pub gain: Option<f64>,
    pub adc_bits: u32,
    pub exposure_min_s: f64,
    pub exposure_max_s: f64,
    pub exposure_step_s: f64,
    /// Time to shift the exposed pixels into the storage region.
    pub transfer_s: f64,
    pub readout_s: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            sensor: Sensor::default(),
            gain: None,
            adc_bits: DEFAULT_ADC_BITS,
            exposure_min_s: 2.0,
            exposure_max_s: 600.0,
            exposure_step_s: 0.1,
            transfer_s: 0.05,
            readout_s: 1.1,
        }
    }
}

impl Camera {
    /// Largest count the ADC can report.
    pub fn saturation_level(&self) -> f64 {
        2f64.powf(f64::from(self.adc_bits)) - 1.0
    }

    /// Reject models no real camera could have.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_ADC_BITS).contains(&self.adc_bits) {
            return Err(CalibrationError::Value(format!(
                "ADC resolution must be 1..={MAX_ADC_BITS} bits, got {}",
                self.adc_bits
            )));
        }
        if !(self.exposure_min_s.is_finite()
            && self.exposure_max_s.is_finite()
            && 0.0 <= self.exposure_min_s
            && self.exposure_min_s <= self.exposure_max_s)
        {
            return Err(CalibrationError::Value(format!(
                "exposure range {}..{} s is not valid",
                self.exposure_min_s, self.exposure_max_s
            )));
        }
        Ok(())
    }

    /// Whether a non-zero exposure time is within the commandable range.
    pub fn exposure_in_range(&self, seconds: f64) -> bool {
        seconds >= self.exposure_min_s && seconds <= self.exposure_max_s
    }

    /// Exposure counter value to seconds.
    pub fn calibrate_exposure(counts: u64) -> f64 {
        counts as f64 * EXPOSURE_SECONDS_PER_COUNT
    }

    /// FPGA supply monitor counts to volts.
    pub fn calibrate_voltage_fpga(counts: u16) -> f64 {
        f64::from(counts) * FPGA_VOLTAGE_FULL_SCALE / HOUSEKEEPING_ADC_COUNTS
    }

    /// FPGA die temperature counts to degrees Celsius.
    pub fn calibrate_temperature_fpga(counts: u16) -> f64 {
        f64::from(counts) * FPGA_TEMPERATURE_FULL_SCALE / HOUSEKEEPING_ADC_COUNTS - KELVIN_OFFSET
    }

    /// ADC 1 thermistor counts to degrees Celsius (beta model, B = 3455 K).
    pub fn calibrate_temperature_adc_1(counts: u16) -> Result<f64> {
        let r = thermistor_resistance(counts)?;
        let kelvin = 3455.0 / (r / 0.0927557).ln();
        Ok(kelvin - KELVIN_OFFSET)
    }

    /// ADC 2-4 thermistor counts to degrees Celsius (Steinhart-Hart).
    pub fn calibrate_temperature_adc_234(counts: u16) -> Result<f64> {
        let ln_r = thermistor_resistance(counts)?.ln();
        let (a, b, c) = (0.0011275, 0.00023441, 0.000000086482);
        let kelvin = 1.0 / (a + b * ln_r + c * ln_r.powi(3));
        Ok(kelvin - KELVIN_OFFSET)
    }
}

/// Thermistor resistance in ohms from the divider reading.
fn thermistor_resistance(counts: u16) -> Result<f64> {
    let v = f64::from(counts);
    if counts == 0 || v >= HOUSEKEEPING_ADC_COUNTS {
        return Err(CalibrationError::Value(format!(
            "thermistor reading {counts} outside (0, {HOUSEKEEPING_ADC_COUNTS})"
        )));
    }
    Ok(9.814453125 * v / (1.0 - v / HOUSEKEEPING_ADC_COUNTS))
}

/// Raw housekeeping counts recorded with each image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Housekeeping {
    pub exposure_counts: u64,
    pub voltage_fpga_vccint: u16,
    pub voltage_fpga_vccaux: u16,
    pub voltage_fpga_vccbram: u16,
    pub temperature_fpga: u16,
    pub temperature_adc: [u16; 4],
}

/// Housekeeping converted to physical units.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HousekeepingReading {
    pub exposure_s: f64,
    pub voltage_fpga_vccint: f64,
    pub voltage_fpga_vccaux: f64,
    pub voltage_fpga_vccbram: f64,
    pub temperature_fpga_c: f64,
    pub temperature_adc_c: [f64; 4],
}

impl Housekeeping {
    pub fn calibrate(&self) -> Result<HousekeepingReading> {
        let [t1, t2, t3, t4] = self.temperature_adc;
        Ok(HousekeepingReading {
            exposure_s: Camera::calibrate_exposure(self.exposure_counts),
            voltage_fpga_vccint: Camera::calibrate_voltage_fpga(self.voltage_fpga_vccint),
            voltage_fpga_vccaux: Camera::calibrate_voltage_fpga(self.voltage_fpga_vccaux),
            voltage_fpga_vccbram: Camera::calibrate_voltage_fpga(self.voltage_fpga_vccbram),
            temperature_fpga_c: Camera::calibrate_temperature_fpga(self.temperature_fpga),
            temperature_adc_c: [
                Camera::calibrate_temperature_adc_1(t1)?,
                Camera::calibrate_temperature_adc_234(t2)?,
                Camera::calibrate_temperature_adc_234(t3)?,
                Camera::calibrate_temperature_adc_234(t4)?,
            ],
        })
    }
}
