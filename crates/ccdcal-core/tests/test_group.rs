mod common;

use ccdcal_core::error::CalibrationError;
use ccdcal_core::frame::{CameraId, Frame};
use ccdcal_core::group::{aggregate, GroupingMode};
use ccdcal_core::noise::VarianceMethod;
use ndarray::Array2;

use common::constant_frame;

fn frames_at(exposures: &[f64]) -> Vec<Frame> {
    exposures
        .iter()
        .map(|&t| constant_frame(4, 4, 100, t))
        .collect()
}

// ---------------------------------------------------------------------------
// Partitioning
// ---------------------------------------------------------------------------

#[test]
fn test_levels_sorted_by_exposure() {
    let frames = frames_at(&[2.0, 0.0, 1.0, 2.0, 0.0, 1.0]);
    let set = aggregate(&frames, GroupingMode::Pairwise).unwrap();
    let times: Vec<f64> = set.levels().iter().map(|l| l.exposure_time).collect();
    assert_eq!(times, vec![0.0, 1.0, 2.0]);
    assert_eq!(set.total_frames(), 6);
}

#[test]
fn test_level_indices_keep_input_order() {
    let frames = frames_at(&[1.0, 0.0, 1.0, 0.0]);
    let set = aggregate(&frames, GroupingMode::Pairwise).unwrap();
    assert_eq!(set.bias_level().unwrap().indices, vec![1, 3]);
    assert_eq!(set.levels()[1].indices, vec![0, 2]);
}

#[test]
fn test_signal_levels_skip_bias() {
    let frames = frames_at(&[0.0, 0.0, 1.0, 1.0, 3.0, 3.0]);
    let set = aggregate(&frames, GroupingMode::Pairwise).unwrap();
    let signal: Vec<f64> = set.signal_levels().map(|l| l.exposure_time).collect();
    assert_eq!(signal, vec![1.0, 3.0]);
}

#[test]
fn test_pairs_are_consecutive() {
    let frames = frames_at(&[1.0, 1.0, 1.0, 1.0]);
    let set = aggregate(&frames, GroupingMode::Pairwise).unwrap();
    let pairs = set.pairs(&set.levels()[0]).unwrap();
    assert_eq!(pairs.len(), 2);
    assert!(std::ptr::eq(pairs[0].0, &frames[0]));
    assert!(std::ptr::eq(pairs[0].1, &frames[1]));
    assert!(std::ptr::eq(pairs[1].0, &frames[2]));
}

#[test]
fn test_bias_only_view() {
    let frames = frames_at(&[0.0, 0.0, 1.0, 1.0]);
    let set = aggregate(&frames, GroupingMode::Pairwise).unwrap();
    let bias = set.bias_only();
    assert_eq!(bias.levels().len(), 1);
    assert_eq!(bias.total_frames(), 2);
    assert_eq!(bias.dim(), (4, 4));
}

#[test]
fn test_bias_only_without_bias_frames_is_empty() {
    let frames = frames_at(&[1.0, 1.0]);
    let set = aggregate(&frames, GroupingMode::Pairwise).unwrap();
    let bias = set.bias_only();
    assert!(bias.levels().is_empty());
    assert_eq!(bias.camera(), frames[0].camera());
}

// ---------------------------------------------------------------------------
// Mode rules
// ---------------------------------------------------------------------------

#[test]
fn test_pairwise_rejects_odd_level() {
    let frames = frames_at(&[1.0, 1.0, 1.0]);
    let err = aggregate(&frames, GroupingMode::Pairwise).unwrap_err();
    assert!(matches!(err, CalibrationError::Grouping(_)));
}

#[test]
fn test_ladder_accepts_odd_level() {
    let frames = frames_at(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    let set = aggregate(&frames, GroupingMode::Ladder).unwrap();
    assert_eq!(set.levels().len(), 3);
    assert_eq!(set.variance_method(), VarianceMethod::MultiFrame);
}

#[test]
fn test_ladder_needs_two_signal_levels() {
    let frames = frames_at(&[0.0, 0.0, 1.0, 1.0]);
    let err = aggregate(&frames, GroupingMode::Ladder).unwrap_err();
    assert!(matches!(err, CalibrationError::InsufficientData(_)));
}

#[test]
fn test_ladder_needs_bias() {
    let frames = frames_at(&[1.0, 1.0, 2.0, 2.0]);
    let err = aggregate(&frames, GroupingMode::Ladder).unwrap_err();
    assert!(matches!(err, CalibrationError::InsufficientData(_)));
}

#[test]
fn test_pairwise_selects_pair_difference() {
    let frames = frames_at(&[1.0, 1.0]);
    let set = aggregate(&frames, GroupingMode::Pairwise).unwrap();
    assert_eq!(set.variance_method(), VarianceMethod::PairwiseDifference);
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_empty_input() {
    let err = aggregate(&[], GroupingMode::Pairwise).unwrap_err();
    assert!(matches!(err, CalibrationError::InsufficientData(_)));
}

#[test]
fn test_shape_mismatch() {
    let frames = vec![constant_frame(4, 4, 100, 1.0), constant_frame(4, 5, 100, 1.0)];
    let err = aggregate(&frames, GroupingMode::Pairwise).unwrap_err();
    assert!(matches!(err, CalibrationError::Grouping(_)));
}

#[test]
fn test_camera_mismatch() {
    let other = Frame::new(
        Array2::from_elem((4, 4), 100u16),
        1.0,
        CameraId::new("SN21", "test"),
    )
    .unwrap();
    let frames = vec![constant_frame(4, 4, 100, 1.0), other];
    let err = aggregate(&frames, GroupingMode::Pairwise).unwrap_err();
    assert!(matches!(err, CalibrationError::Grouping(_)));
}

#[test]
fn test_grouping_mode_display() {
    assert_eq!(GroupingMode::Pairwise.to_string(), "Pairwise");
    assert_eq!(GroupingMode::Ladder.to_string(), "Ladder");
    assert_eq!(GroupingMode::default(), GroupingMode::Pairwise);
}
