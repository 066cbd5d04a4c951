/// Minimum pixel count (h*w) to update per-pixel moments with Rayon.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum number of exposure levels to estimate variance in parallel.
pub const PARALLEL_LEVEL_THRESHOLD: usize = 4;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-12;

/// Default fraction of the ADC full scale above which a PTC point is
/// treated as saturated.
pub const DEFAULT_SATURATION_FRACTION: f64 = 0.9;

/// Default upper bound on `sum(residual^2) / sum(variance^2)` over the
/// linear-regime PTC points.
pub const DEFAULT_MAX_RELATIVE_RSS: f64 = 0.01;

/// Number of bits of the MSFC camera analog-to-digital converter.
pub const DEFAULT_ADC_BITS: u32 = 16;

/// Widest ADC a camera model may declare.
pub const MAX_ADC_BITS: u32 = 32;

/// Duration of one exposure counter tick, in seconds (25 ns).
pub const EXPOSURE_SECONDS_PER_COUNT: f64 = 25e-9;

/// FPGA voltage monitor full scale, in volts.
pub const FPGA_VOLTAGE_FULL_SCALE: f64 = 3.0;

/// FPGA temperature monitor full scale, in kelvin.
pub const FPGA_TEMPERATURE_FULL_SCALE: f64 = 503.975;

/// Resolution of the 12-bit housekeeping ADC.
pub const HOUSEKEEPING_ADC_COUNTS: f64 = 4096.0;

/// Offset between the kelvin and Celsius scales.
pub const KELVIN_OFFSET: f64 = 273.15;

/// Number of taps along the long (column) axis of the CCD230.
pub const CCD230_TAPS_X: usize = 2;

/// Number of taps along the short (row) axis of the CCD230.
pub const CCD230_TAPS_Y: usize = 2;

/// Blank columns at the start of each tap row of the CCD230.
pub const CCD230_BLANK_COLUMNS: usize = 50;

/// Overscan columns at the end of each tap row of the CCD230.
pub const CCD230_OVERSCAN_COLUMNS: usize = 2;

/// Physical pixel pitch of the CCD230, in micrometres.
pub const CCD230_PIXEL_WIDTH_UM: f64 = 15.0;
