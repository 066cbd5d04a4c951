use std::ops::Range;

use ndarray::{s, Array2, ArrayView2};
use num_traits::AsPrimitive;

use crate::camera::Sensor;
use crate::error::{CalibrationError, Result};
use crate::frame::Frame;

/// A sensor image split into one image per readout amplifier.
///
/// Each tap image is flipped so that row 0 and column 0 are nearest its
/// amplifier: every row starts with the blank columns and ends with the
/// overscan columns. `images[ty * taps_x + tx]` holds tap `(tx, ty)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Taps<A> {
    pub taps_x: usize,
    pub taps_y: usize,
    pub images: Vec<Array2<A>>,
}

/// Rows or columns of tap `t` out of `n` along an axis of length `len`,
/// with the step that puts the readout side first.
fn tap_span(t: usize, n: usize, len: usize) -> (Range<usize>, isize) {
    let size = len / n;
    let step = if t == 1 { -1 } else { 1 };
    (t * size..(t + 1) * size, step)
}

fn check_layout(dim: (usize, usize), sensor: &Sensor) -> Result<()> {
    let (h, w) = dim;
    if !(1..=2).contains(&sensor.taps_x) || !(1..=2).contains(&sensor.taps_y) {
        return Err(CalibrationError::Shape(format!(
            "only 1 or 2 taps per axis are supported, got {}x{}",
            sensor.taps_x, sensor.taps_y
        )));
    }
    if w % sensor.taps_x != 0 || h % sensor.taps_y != 0 {
        return Err(CalibrationError::Shape(format!(
            "{h}x{w} image does not divide into {}x{} taps",
            sensor.taps_y, sensor.taps_x
        )));
    }
    Ok(())
}

/// Split a full-sensor image into tap images.
pub fn split_taps<A: Clone>(data: ArrayView2<'_, A>, sensor: &Sensor) -> Result<Taps<A>> {
    check_layout(data.dim(), sensor)?;
    let (h, w) = data.dim();

    let mut images = Vec::with_capacity(sensor.taps_x * sensor.taps_y);
    for ty in 0..sensor.taps_y {
        let (rows, row_step) = tap_span(ty, sensor.taps_y, h);
        for tx in 0..sensor.taps_x {
            let (cols, col_step) = tap_span(tx, sensor.taps_x, w);
            images.push(
                data.slice(s![rows.clone();row_step, cols;col_step])
                    .to_owned(),
            );
        }
    }

    Ok(Taps {
        taps_x: sensor.taps_x,
        taps_y: sensor.taps_y,
        images,
    })
}

/// Reassemble tap images into a full-sensor image; inverse of [`split_taps`].
pub fn merge_taps<A: Clone + Default>(taps: &Taps<A>) -> Result<Array2<A>> {
    let first = taps.images.first().ok_or_else(|| {
        CalibrationError::Shape("no tap images to merge".into())
    })?;
    if taps.images.len() != taps.taps_x * taps.taps_y {
        return Err(CalibrationError::Shape(format!(
            "{} tap images for a {}x{} layout",
            taps.images.len(),
            taps.taps_y,
            taps.taps_x
        )));
    }
    let (th, tw) = first.dim();
    if taps.images.iter().any(|t| t.dim() != (th, tw)) {
        return Err(CalibrationError::Shape("tap images differ in shape".into()));
    }

    let (h, w) = (th * taps.taps_y, tw * taps.taps_x);
    let mut out = Array2::<A>::default((h, w));
    for ty in 0..taps.taps_y {
        let (rows, row_step) = tap_span(ty, taps.taps_y, h);
        for tx in 0..taps.taps_x {
            let (cols, col_step) = tap_span(tx, taps.taps_x, w);
            out.slice_mut(s![rows.clone();row_step, cols;col_step])
                .assign(&taps.images[ty * taps.taps_x + tx]);
        }
    }
    Ok(out)
}

/// Blank columns of a tap row, the `num` closest to the active area
/// (all of them when `num` is `None`).
pub fn blank_columns(sensor: &Sensor, num: Option<usize>) -> Range<usize> {
    let num = num.unwrap_or(sensor.blank_columns).min(sensor.blank_columns);
    sensor.blank_columns - num..sensor.blank_columns
}

/// Overscan columns of a tap row of width `width`, the `num` closest to the
/// active area (all of them when `num` is `None`).
pub fn overscan_columns(sensor: &Sensor, width: usize, num: Option<usize>) -> Range<usize> {
    let start = width.saturating_sub(sensor.overscan_columns);
    let num = num.unwrap_or(sensor.overscan_columns).min(sensor.overscan_columns);
    start..(start + num).min(width)
}

/// Pedestal of one tap: the mean of its selected blank and overscan columns.
pub fn overscan_bias<A>(
    tap: ArrayView2<'_, A>,
    sensor: &Sensor,
    num_blank: Option<usize>,
    num_overscan: Option<usize>,
) -> Result<f64>
where
    A: AsPrimitive<f64>,
{
    let width = tap.ncols();
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for cols in [
        blank_columns(sensor, num_blank),
        overscan_columns(sensor, width, num_overscan),
    ] {
        if cols.end > width {
            return Err(CalibrationError::Shape(format!(
                "tap is {width} columns wide, bias columns reach {}",
                cols.end
            )));
        }
        for v in tap.slice(s![.., cols]).iter() {
            let v: f64 = v.as_();
            sum += v;
            count += 1;
        }
    }
    if count == 0 {
        return Err(CalibrationError::InsufficientData(
            "no blank or overscan columns selected for the tap bias".into(),
        ));
    }
    Ok(sum / count as f64)
}

impl<A: AsPrimitive<f64>> Taps<A> {
    /// Per-tap pedestal. Defaults to overscan columns only, as the blank
    /// columns closest to the serial register can carry charge.
    pub fn bias(&self, sensor: &Sensor) -> Result<Vec<f64>> {
        self.images
            .iter()
            .map(|tap| overscan_bias(tap.view(), sensor, Some(0), None))
            .collect()
    }
}

/// Subtract the per-tap overscan pedestal from a full-sensor image.
pub fn unbiased(data: ArrayView2<'_, u16>, sensor: &Sensor) -> Result<Array2<f64>> {
    let taps = split_taps(data, sensor)?;
    let bias = taps.bias(sensor)?;
    let images = taps
        .images
        .iter()
        .zip(bias)
        .map(|(tap, b)| tap.mapv(|v| f64::from(v) - b))
        .collect();
    merge_taps(&Taps {
        taps_x: taps.taps_x,
        taps_y: taps.taps_y,
        images,
    })
}

/// Keep only the light-sensitive pixels: drop blank and overscan columns
/// from every tap and reassemble.
pub fn active<A: Clone + Default>(data: ArrayView2<'_, A>, sensor: &Sensor) -> Result<Array2<A>> {
    let taps = split_taps(data, sensor)?;
    let width = taps.images[0].ncols();
    let (start, end) = (sensor.blank_columns, width.saturating_sub(sensor.overscan_columns));
    if start >= end {
        return Err(CalibrationError::Shape(format!(
            "tap is {width} columns wide, no active pixels after {} blank and {} overscan",
            sensor.blank_columns, sensor.overscan_columns
        )));
    }
    let images = taps
        .images
        .iter()
        .map(|tap| tap.slice(s![.., start..end]).to_owned())
        .collect();
    merge_taps(&Taps {
        taps_x: taps.taps_x,
        taps_y: taps.taps_y,
        images,
    })
}

/// A copy of `frame` cropped to its active pixels.
pub fn active_frame(frame: &Frame, sensor: &Sensor) -> Result<Frame> {
    let data = active(frame.data(), sensor)?;
    Ok(Frame::new(data, frame.exposure_time(), frame.camera().clone())?
        .with_metadata(frame.metadata().clone()))
}
