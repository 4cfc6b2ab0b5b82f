// src/detection/classifier.rs
//
// Per-frame ratio → direction mapping. Stateless: any smoothing across
// frames is the suspicion engine's job.

use super::calibration::CalibrationBaseline;
use super::types::{GazeDirection, HorizontalDeviation, RatioSample, VerticalDeviation};

#[derive(Debug, Clone, Copy)]
pub struct DirectionClassifier {
    threshold: f64,
}

impl DirectionClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn classify(&self, ratios: RatioSample, baseline: &CalibrationBaseline) -> GazeDirection {
        classify(ratios, baseline, self.threshold)
    }
}

/// Classify one frame against the calibrated center.
///
/// The horizontal ratio grows toward the subject's left, so a positive
/// horizontal deviation reads as `left`. Vertically, smaller is higher.
pub fn classify(
    ratios: RatioSample,
    baseline: &CalibrationBaseline,
    threshold: f64,
) -> GazeDirection {
    if !baseline.calibrated {
        return GazeDirection::NotCalibrated;
    }

    let (horizontal, vertical) = match (ratios.horizontal, ratios.vertical) {
        (Some(h), Some(v)) => (h, v),
        _ => return GazeDirection::Blink,
    };

    let h_diff = horizontal - baseline.horizontal_center;
    let v_diff = vertical - baseline.vertical_center;

    let h = if h_diff.abs() > threshold {
        if h_diff < 0.0 {
            HorizontalDeviation::Right
        } else {
            HorizontalDeviation::Left
        }
    } else {
        HorizontalDeviation::None
    };

    let v = if v_diff.abs() > threshold {
        if v_diff < 0.0 {
            VerticalDeviation::Up
        } else {
            VerticalDeviation::Down
        }
    } else {
        VerticalDeviation::None
    };

    GazeDirection::new(h, v)
}
