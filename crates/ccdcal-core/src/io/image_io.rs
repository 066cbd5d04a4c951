use std::path::Path;

use image::{GrayImage, ImageBuffer, ImageFormat, Luma};
use ndarray::{Array2, ArrayView2};

use crate::error::{CalibrationError, Result};
use crate::frame::{CameraId, Frame};

/// Load a grayscale image file as raw counts.
///
/// 8-bit images are widened without rescaling, so a value of 200 stays 200.
pub fn load_counts(path: &Path, exposure_time: f64, camera: &CameraId) -> Result<Frame> {
    let img = image::open(path)?;
    let data = match img {
        image::DynamicImage::ImageLuma8(gray) => {
            let (w, h) = gray.dimensions();
            let pixels = gray.into_raw().into_iter().map(u16::from).collect();
            to_array(w, h, pixels)?
        }
        other => {
            let gray = other.into_luma16();
            let (w, h) = gray.dimensions();
            to_array(w, h, gray.into_raw())?
        }
    };
    Frame::new(data, exposure_time, camera.clone())
}

fn to_array(w: u32, h: u32, pixels: Vec<u16>) -> Result<Array2<u16>> {
    Array2::from_shape_vec((h as usize, w as usize), pixels)
        .map_err(|_| CalibrationError::InvalidDimensions { width: w, height: h })
}

/// Save a map in counts as 16-bit grayscale TIFF, rounding and clamping
/// each value into `0..=65535`.
pub fn save_map_tiff(map: ArrayView2<'_, f64>, path: &Path) -> Result<()> {
    let (h, w) = map.dim();
    let pixels: Vec<u16> = map
        .iter()
        .map(|&v| v.round().clamp(0.0, f64::from(u16::MAX)) as u16)
        .collect();

    let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or(CalibrationError::InvalidDimensions {
            width: w as u32,
            height: h as u32,
        })?;
    img.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

/// Save a map as 8-bit PNG stretched between its minimum and maximum,
/// for previewing.
pub fn save_map_png(map: ArrayView2<'_, f64>, path: &Path) -> Result<()> {
    let (h, w) = map.dim();
    let (lo, hi) = map
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = if hi > lo { hi - lo } else { 1.0 };

    let mut img = GrayImage::new(w as u32, h as u32);
    for ((row, col), &v) in map.indexed_iter() {
        let val = ((v - lo) / span * 255.0).round().clamp(0.0, 255.0) as u8;
        img.put_pixel(col as u32, row as u32, Luma([val]));
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save a map, choosing format from file extension.
pub fn save_map(map: ArrayView2<'_, f64>, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_map_png(map, path),
        _ => save_map_tiff(map, path),
    }
}
