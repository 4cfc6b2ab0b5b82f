// src/sensor/mod.rs
//
// Seams to the capture device and the eye-landmark estimator. Both are
// external; the pipeline only needs these two traits.

pub mod replay;

pub use replay::{EstimatorReading, JsonlFeed, RecordedEstimator};

use crate::detection::RatioSample;
use crate::error::CaptureError;
use serde::{Deserialize, Serialize};

/// Operator input delivered between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCommand {
    /// Subject is positioned, start timed calibration
    Ready,
    /// Operator saw a cheating attempt
    Mark,
    /// Toggle the per-frame debug overlay
    Debug,
    Stop,
}

#[derive(Debug, Clone)]
pub enum FeedItem<F> {
    Frame(F),
    Command(SessionCommand),
}

pub trait FrameSource {
    type Frame;

    /// Next frame or operator command. `Ok(None)` means the stream ended.
    fn next_item(&mut self) -> Result<Option<FeedItem<Self::Frame>>, CaptureError>;
}

/// Black-box pupil estimator: refresh on a frame, then query.
pub trait GazeEstimator {
    type Frame;

    fn refresh(&mut self, frame: &Self::Frame);
    fn horizontal_ratio(&self) -> Option<f64>;
    fn vertical_ratio(&self) -> Option<f64>;
    fn pupil_left_coords(&self) -> Option<(i32, i32)>;
    fn pupil_right_coords(&self) -> Option<(i32, i32)>;
    fn is_blinking(&self) -> bool;

    fn ratios(&self) -> RatioSample {
        RatioSample {
            horizontal: self.horizontal_ratio(),
            vertical: self.vertical_ratio(),
        }
    }
}
