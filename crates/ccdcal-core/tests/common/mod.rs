#![allow(dead_code)]

use ccdcal_core::frame::{CameraId, Frame};
use ccdcal_core::io::ser::SER_HEADER_SIZE;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

pub fn test_camera() -> CameraId {
    CameraId::new("SN20", "test")
}

/// A frame where every pixel holds `value`.
pub fn constant_frame(height: usize, width: usize, value: u16, exposure_time: f64) -> Frame {
    Frame::new(
        Array2::from_elem((height, width), value),
        exposure_time,
        test_camera(),
    )
    .unwrap()
}

/// A frame of Gaussian counts around `mean` with standard deviation `sigma`.
pub fn noisy_frame(
    rng: &mut StdRng,
    height: usize,
    width: usize,
    mean: f64,
    sigma: f64,
    exposure_time: f64,
) -> Frame {
    let normal = Normal::new(mean, sigma).unwrap();
    let data = Array2::from_shape_simple_fn((height, width), || {
        normal.sample(rng).round().clamp(0.0, 65535.0) as u16
    });
    Frame::new(data, exposure_time, test_camera()).unwrap()
}

/// `count` Gaussian frames sharing one exposure, drawn from a seeded rng.
pub fn noisy_stack(
    seed: u64,
    count: usize,
    dim: (usize, usize),
    mean: f64,
    sigma: f64,
    exposure_time: f64,
) -> Vec<Frame> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| noisy_frame(&mut rng, dim.0, dim.1, mean, sigma, exposure_time))
        .collect()
}

/// Two frames whose pair statistics are exact: the pixelwise mean of the
/// pair is `level` everywhere and `var(A - B) / 2` equals `variance` up to
/// integer rounding of `1 / (height * width)`.
///
/// `height * width` must be even.
pub fn exact_pair(
    height: usize,
    width: usize,
    level: u16,
    variance: f64,
    exposure_time: f64,
) -> [Frame; 2] {
    let n = height * width;
    assert!(n % 2 == 0, "exact_pair needs an even pixel count");

    // Half differences h with mean 0 and mean(h^2) = target, built from
    // magnitudes lo and lo + 1 with balanced signs.
    let target = 0.5 * variance * (n - 1) as f64 / n as f64;
    let lo = target.sqrt().floor();
    let hi = lo + 1.0;
    let p_lo = (hi * hi - target) / (hi * hi - lo * lo);
    let n_lo = ((p_lo * n as f64 / 2.0).round() as usize * 2).min(n);

    let half: Vec<i32> = (0..n)
        .map(|i| {
            let mag = (if i < n_lo { lo } else { hi }) as i32;
            if i % 2 == 0 { mag } else { -mag }
        })
        .collect();

    let build = |sign: i32| {
        let pixels: Vec<u16> = half
            .iter()
            .map(|&h| (i32::from(level) + sign * h) as u16)
            .collect();
        Frame::from_shape_vec((height, width), pixels, exposure_time, test_camera()).unwrap()
    };
    [build(1), build(-1)]
}

/// Frames following `variance = mean / gain + read_noise^2 / gain^2`, one
/// exact pair per level on top of a bias pair at `bias` counts.
pub fn ptc_pairs(
    dim: (usize, usize),
    bias: u16,
    gain: f64,
    read_noise: f64,
    means: &[u16],
) -> Vec<Frame> {
    let read_var = (read_noise / gain).powi(2);
    let mut frames: Vec<Frame> = exact_pair(dim.0, dim.1, bias, read_var, 0.0).into();
    for (i, &mean) in means.iter().enumerate() {
        let variance = f64::from(mean) / gain + read_var;
        frames.extend(exact_pair(
            dim.0,
            dim.1,
            bias + mean,
            variance,
            (i + 1) as f64,
        ));
    }
    frames
}

/// Build a SER file header.
///
/// `color_id`: 0=MONO, 8=BAYER_RGGB, 100=RGB, 101=BGR
pub fn build_ser_header_full(
    width: u32,
    height: u32,
    bit_depth: u32,
    num_frames: usize,
    color_id: i32,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);

    // Magic (14 bytes)
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID
    buf.extend_from_slice(&0i32.to_le_bytes());
    // ColorID
    buf.extend_from_slice(&color_id.to_le_bytes());
    // LittleEndian = 0 (little-endian)
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer (40 bytes)
    let mut observer = [0u8; 40];
    observer[..4].copy_from_slice(b"Test");
    buf.extend_from_slice(&observer);
    // Instrument (40 bytes)
    let mut instrument = [0u8; 40];
    instrument[..6].copy_from_slice(b"CCD230");
    buf.extend_from_slice(&instrument);
    // Telescope (40 bytes)
    buf.extend_from_slice(&[0u8; 40]);
    // DateTime, DateTimeUTC
    buf.extend_from_slice(&0u64.to_le_bytes());
    buf.extend_from_slice(&0u64.to_le_bytes());

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

/// A complete mono 16-bit SER file.
pub fn build_ser_u16(width: u32, height: u32, frames: &[Vec<u16>]) -> Vec<u8> {
    let mut buf = build_ser_header_full(width, height, 16, frames.len(), 0);
    for frame in frames {
        for v in frame {
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
    buf
}

/// Write bytes to a temporary file and return the handle.
///
/// The file stays alive as long as the returned `NamedTempFile` is not dropped.
pub fn write_temp(data: &[u8]) -> tempfile::NamedTempFile {
    use std::io::Write;
    let mut f = tempfile::NamedTempFile::new().expect("create temp file");
    f.write_all(data).expect("write data");
    f.flush().expect("flush");
    f
}
