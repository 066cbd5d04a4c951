use std::fs::File;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use ndarray::Array2;

use crate::error::{CalibrationError, Result};
use crate::frame::{CameraId, Frame, FrameMetadata};

pub const SER_HEADER_SIZE: usize = 178;
const SER_MAGIC: &[u8; 14] = b"LUCAM-RECORDER";

/// SER file header (178 bytes).
#[derive(Clone, Debug)]
pub struct SerHeader {
    pub color_id: i32,
    pub little_endian: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_depth: u32,
    pub frame_count: u32,
    /// Camera name written by the capture software.
    pub instrument: String,
}

impl SerHeader {
    /// Bytes per sample (1 for 8-bit, 2 for 9-16 bit).
    pub fn bytes_per_sample(&self) -> usize {
        if self.pixel_depth <= 8 { 1 } else { 2 }
    }

    /// Mono and Bayer recordings store one sample per pixel.
    pub fn is_single_plane(&self) -> bool {
        !matches!(self.color_id, 100 | 101)
    }

    /// Total bytes per frame, `None` on overflow.
    pub fn frame_byte_size(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_sample())
    }
}

/// Memory-mapped reader for raw SER recordings.
///
/// Pixels are returned as untouched ADC counts; calibration needs the
/// sensor's own units, not a normalised intensity.
pub struct SerReader {
    mmap: Mmap,
    frame_bytes: usize,
    pub header: SerHeader,
}

impl SerReader {
    /// Open a SER file and parse its header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < SER_HEADER_SIZE {
            return Err(CalibrationError::InvalidSer(
                "File too small for SER header".into(),
            ));
        }

        if &mmap[0..14] != SER_MAGIC {
            return Err(CalibrationError::InvalidSer(
                "Missing LUCAM-RECORDER magic".into(),
            ));
        }

        let header = parse_header(&mmap[..SER_HEADER_SIZE])?;
        if !header.is_single_plane() {
            return Err(CalibrationError::InvalidSer(format!(
                "color id {} is an RGB recording; raw sensor counts need a single plane",
                header.color_id
            )));
        }

        let frame_bytes = header.frame_byte_size().ok_or_else(|| {
            CalibrationError::InvalidSer("Frame size calculation overflow".into())
        })?;
        let expected_data_size = frame_bytes
            .checked_mul(header.frame_count as usize)
            .and_then(|n| n.checked_add(SER_HEADER_SIZE))
            .ok_or_else(|| CalibrationError::InvalidSer("File size calculation overflow".into()))?;
        if mmap.len() < expected_data_size {
            return Err(CalibrationError::InvalidSer(format!(
                "File truncated: expected at least {} bytes, got {}",
                expected_data_size,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            frame_bytes,
            header,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.header.frame_count as usize
    }

    /// Get the raw bytes for a single frame (zero-copy from mmap).
    pub fn frame_raw(&self, index: usize) -> Result<&[u8]> {
        let count = self.frame_count();
        if index >= count {
            return Err(CalibrationError::FrameIndexOutOfRange {
                index,
                total: count,
            });
        }
        let offset = SER_HEADER_SIZE + index * self.frame_bytes;
        Ok(&self.mmap[offset..offset + self.frame_bytes])
    }

    /// Read the counts of a single frame.
    pub fn read_counts(&self, index: usize) -> Result<Array2<u16>> {
        let raw = self.frame_raw(index)?;
        Ok(decode_counts(
            raw,
            self.header.height as usize,
            self.header.width as usize,
            self.header.bytes_per_sample(),
            self.header.little_endian,
        ))
    }

    /// Read a single frame, tagged with its exposure time and camera.
    pub fn read_frame(&self, index: usize, exposure_time: f64, camera: &CameraId) -> Result<Frame> {
        let data = self.read_counts(index)?;
        let frame = Frame::new(data, exposure_time, camera.clone())?;
        Ok(frame.with_metadata(FrameMetadata {
            frame_index: index,
            timestamp_us: self.read_timestamp(index),
            housekeeping: None,
        }))
    }

    /// Read per-frame timestamp from the optional trailer.
    fn read_timestamp(&self, index: usize) -> Option<u64> {
        let trailer_offset = SER_HEADER_SIZE + self.frame_bytes * self.frame_count();
        let ts_offset = trailer_offset + index * 8;
        if ts_offset + 8 <= self.mmap.len() {
            let bytes = &self.mmap[ts_offset..ts_offset + 8];
            Some(u64::from_le_bytes(bytes.try_into().ok()?))
        } else {
            None
        }
    }

    /// Iterator over all frames, all sharing one exposure time.
    pub fn frames<'a>(
        &'a self,
        exposure_time: f64,
        camera: &'a CameraId,
    ) -> impl Iterator<Item = Result<Frame>> + 'a {
        (0..self.frame_count()).map(move |i| self.read_frame(i, exposure_time, camera))
    }
}

fn parse_header(buf: &[u8]) -> Result<SerHeader> {
    let mut cursor = std::io::Cursor::new(&buf[14..]); // skip magic

    let _lu_id = cursor.read_i32::<LittleEndian>()?;
    let color_id = cursor.read_i32::<LittleEndian>()?;
    let le_flag = cursor.read_i32::<LittleEndian>()?;
    let width = cursor.read_i32::<LittleEndian>()? as u32;
    let height = cursor.read_i32::<LittleEndian>()? as u32;
    let pixel_depth = cursor.read_i32::<LittleEndian>()? as u32;
    let frame_count = cursor.read_i32::<LittleEndian>()? as u32;

    let instrument = read_fixed_string(&buf[82..122]);

    if width == 0 || height == 0 {
        return Err(CalibrationError::InvalidDimensions { width, height });
    }
    if pixel_depth == 0 || pixel_depth > 16 {
        return Err(CalibrationError::InvalidSer(format!(
            "unsupported pixel depth {pixel_depth}"
        )));
    }

    // LittleEndian = 0 is written by most capture tools for little-endian
    // data, so only 1 selects big-endian.
    let little_endian = le_flag != 1;

    Ok(SerHeader {
        color_id,
        little_endian,
        width,
        height,
        pixel_depth,
        frame_count,
        instrument,
    })
}

fn read_fixed_string(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

fn decode_counts(
    raw: &[u8],
    height: usize,
    width: usize,
    bytes_per_sample: usize,
    little_endian: bool,
) -> Array2<u16> {
    let mut data = Array2::<u16>::zeros((height, width));

    for ((row, col), out) in data.indexed_iter_mut() {
        let idx = (row * width + col) * bytes_per_sample;
        *out = if bytes_per_sample == 1 {
            u16::from(raw[idx])
        } else {
            let pair = [raw[idx], raw[idx + 1]];
            if little_endian {
                u16::from_le_bytes(pair)
            } else {
                u16::from_be_bytes(pair)
            }
        };
    }

    data
}
