mod common;

use ccdcal_core::error::CalibrationError;
use ccdcal_core::frame::CameraId;
use ccdcal_core::io::ser::SerReader;

use common::{build_ser_header_full, build_ser_u16, test_camera, write_temp};

#[test]
fn test_read_16bit_counts_untouched() {
    let frame: Vec<u16> = vec![0, 1, 1000, 65535, 42, 7];
    let file = write_temp(&build_ser_u16(3, 2, &[frame.clone()]));

    let reader = SerReader::open(file.path()).unwrap();
    assert_eq!(reader.frame_count(), 1);
    assert_eq!(reader.header.width, 3);
    assert_eq!(reader.header.height, 2);
    assert_eq!(reader.header.instrument, "CCD230");

    let counts = reader.read_counts(0).unwrap();
    assert_eq!(counts.iter().copied().collect::<Vec<_>>(), frame);
}

#[test]
fn test_read_8bit_widens_without_scaling() {
    let mut data = build_ser_header_full(2, 2, 8, 1, 0);
    data.extend_from_slice(&[0, 10, 200, 255]);
    let file = write_temp(&data);

    let reader = SerReader::open(file.path()).unwrap();
    let counts = reader.read_counts(0).unwrap();
    assert_eq!(counts[[1, 0]], 200);
    assert_eq!(counts[[1, 1]], 255);
}

#[test]
fn test_read_frame_tags_exposure_and_camera() {
    let frames = vec![vec![1u16; 4], vec![2u16; 4]];
    let file = write_temp(&build_ser_u16(2, 2, &frames));
    let reader = SerReader::open(file.path()).unwrap();

    let frame = reader.read_frame(1, 2.5, &test_camera()).unwrap();
    assert_eq!(frame.exposure_time(), 2.5);
    assert_eq!(frame.camera(), &test_camera());
    assert_eq!(frame.metadata().frame_index, 1);
    assert!(frame.data().iter().all(|&v| v == 2));
}

#[test]
fn test_frames_iterator() {
    let frames = vec![vec![1u16; 4], vec![2u16; 4], vec![3u16; 4]];
    let file = write_temp(&build_ser_u16(2, 2, &frames));
    let reader = SerReader::open(file.path()).unwrap();
    let camera = CameraId::new("SN7", "");

    let loaded: Vec<_> = reader
        .frames(0.0, &camera)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(loaded.len(), 3);
    assert!(loaded.iter().all(|f| f.is_bias()));
    assert_eq!(loaded[2].data()[[0, 0]], 3);
}

#[test]
fn test_trailer_timestamps() {
    let mut data = build_ser_u16(2, 1, &[vec![0, 0], vec![0, 0]]);
    data.extend_from_slice(&111u64.to_le_bytes());
    data.extend_from_slice(&222u64.to_le_bytes());
    let file = write_temp(&data);
    let reader = SerReader::open(file.path()).unwrap();

    let frame = reader.read_frame(1, 1.0, &test_camera()).unwrap();
    assert_eq!(frame.metadata().timestamp_us, Some(222));
}

#[test]
fn test_frame_index_out_of_range() {
    let file = write_temp(&build_ser_u16(2, 2, &[vec![0u16; 4]]));
    let reader = SerReader::open(file.path()).unwrap();
    let err = reader.read_counts(5).unwrap_err();
    assert!(matches!(
        err,
        CalibrationError::FrameIndexOutOfRange { index: 5, total: 1 }
    ));
}

#[test]
fn test_rejects_bad_magic() {
    let mut data = build_ser_u16(2, 2, &[vec![0u16; 4]]);
    data[0] = b'X';
    let file = write_temp(&data);
    assert!(matches!(
        SerReader::open(file.path()),
        Err(CalibrationError::InvalidSer(_))
    ));
}

#[test]
fn test_rejects_truncated_file() {
    let mut data = build_ser_u16(4, 4, &[vec![0u16; 16]]);
    data.truncate(data.len() - 4);
    let file = write_temp(&data);
    assert!(matches!(
        SerReader::open(file.path()),
        Err(CalibrationError::InvalidSer(_))
    ));
}

#[test]
fn test_rejects_rgb() {
    let mut data = build_ser_header_full(1, 1, 16, 1, 100);
    data.extend_from_slice(&[0u8; 6]);
    let file = write_temp(&data);
    assert!(matches!(
        SerReader::open(file.path()),
        Err(CalibrationError::InvalidSer(_))
    ));
}

#[test]
fn test_rejects_zero_dimensions() {
    let data = build_ser_header_full(0, 4, 16, 0, 0);
    let file = write_temp(&data);
    assert!(matches!(
        SerReader::open(file.path()),
        Err(CalibrationError::InvalidDimensions { width: 0, height: 4 })
    ));
}

#[test]
fn test_rejects_short_file() {
    let file = write_temp(b"LUCAM-RECORDER");
    assert!(matches!(
        SerReader::open(file.path()),
        Err(CalibrationError::InvalidSer(_))
    ));
}
