// src/detection/calibration.rs
//
// Per-subject neutral gaze. The subject looks straight ahead, signals
// ready, and the mean of the ratios sampled over a fixed wall-clock window
// becomes the center every later frame is compared against.

use super::types::RatioSample;
use crate::error::CaptureError;
use crate::sensor::{FeedItem, FrameSource, GazeEstimator, SessionCommand};
use crate::types::Config;
use serde::Serialize;
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationBaseline {
    pub horizontal_center: f64,
    pub vertical_center: f64,
    pub calibrated: bool,
}

impl Default for CalibrationBaseline {
    /// Midpoint, uncalibrated. Every frame classifies as `not calibrated`.
    fn default() -> Self {
        Self {
            horizontal_center: 0.5,
            vertical_center: 0.5,
            calibrated: false,
        }
    }
}

impl CalibrationBaseline {
    pub fn calibrated(horizontal_center: f64, vertical_center: f64) -> Self {
        Self {
            horizontal_center,
            vertical_center,
            calibrated: true,
        }
    }
}

/// Collects present ratios per axis; absent values are skipped, not zeroed.
#[derive(Debug, Default)]
pub struct CalibrationAccumulator {
    horizontal: Vec<f64>,
    vertical: Vec<f64>,
}

impl CalibrationAccumulator {
    pub fn add(&mut self, sample: RatioSample) {
        if let Some(h) = sample.horizontal {
            self.horizontal.push(h);
        }
        if let Some(v) = sample.vertical {
            self.vertical.push(v);
        }
    }

    pub fn sample_counts(&self) -> (usize, usize) {
        (self.horizontal.len(), self.vertical.len())
    }

    pub fn finish(&self) -> CalibrationBaseline {
        match (mean(&self.horizontal), mean(&self.vertical)) {
            (Some(h), Some(v)) => CalibrationBaseline::calibrated(h, v),
            _ => CalibrationBaseline::default(),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// How the wait for the operator's ready signal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyWait {
    Ready,
    Stopped,
    EndOfStream,
}

pub struct Calibrator {
    duration: Duration,
    sample_interval: Duration,
}

impl Calibrator {
    pub fn new(duration: Duration, sample_interval: Duration) -> Self {
        Self {
            duration,
            sample_interval,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.calibration_duration(), config.sample_interval())
    }

    /// Keep feeding frames to the estimator until the operator says the
    /// subject is in position. Marks and debug toggles seen meanwhile are
    /// queued on `deferred` for the monitoring loop.
    pub fn wait_for_ready<S, E>(
        &self,
        source: &mut S,
        estimator: &mut E,
        deferred: &mut VecDeque<SessionCommand>,
    ) -> Result<ReadyWait, CaptureError>
    where
        S: FrameSource,
        E: GazeEstimator<Frame = S::Frame>,
    {
        info!("Calibration: look straight at the screen and signal ready");
        loop {
            match source.next_item()? {
                Some(FeedItem::Frame(frame)) => estimator.refresh(&frame),
                Some(FeedItem::Command(SessionCommand::Ready)) => return Ok(ReadyWait::Ready),
                Some(FeedItem::Command(SessionCommand::Stop)) => return Ok(ReadyWait::Stopped),
                Some(FeedItem::Command(other)) => {
                    debug!("Deferring {:?} until monitoring starts", other);
                    deferred.push_back(other);
                }
                None => return Ok(ReadyWait::EndOfStream),
            }
        }
    }

    /// Timed sampling. Returns `Ok(None)` if the stream ends before the
    /// window elapses. A baseline with `calibrated == false` means no
    /// usable ratio was seen on at least one axis.
    ///
    /// Commands never interrupt sampling; they land on `deferred` in feed
    /// order, stop included.
    pub fn calibrate<S, E>(
        &self,
        source: &mut S,
        estimator: &mut E,
        deferred: &mut VecDeque<SessionCommand>,
    ) -> Result<Option<CalibrationBaseline>, CaptureError>
    where
        S: FrameSource,
        E: GazeEstimator<Frame = S::Frame>,
    {
        info!(
            "Calibrating... keep your eyes still for {:.1}s",
            self.duration.as_secs_f64()
        );

        let start = Instant::now();
        let mut accumulator = CalibrationAccumulator::default();

        while start.elapsed() < self.duration {
            match source.next_item()? {
                Some(FeedItem::Frame(frame)) => {
                    estimator.refresh(&frame);
                    accumulator.add(estimator.ratios());
                }
                Some(FeedItem::Command(command)) => {
                    debug!("Deferring {:?} until calibration ends", command);
                    deferred.push_back(command);
                    continue;
                }
                None => {
                    warn!("Frame source ended during calibration");
                    return Ok(None);
                }
            }
            thread::sleep(self.sample_interval);
        }

        let (h_count, v_count) = accumulator.sample_counts();
        let baseline = accumulator.finish();

        if baseline.calibrated {
            info!(
                "✓ Calibration complete. Center: H={:.2}, V={:.2} ({} / {} samples)",
                baseline.horizontal_center, baseline.vertical_center, h_count, v_count
            );
        } else {
            warn!(
                "⚠️  Calibration failed ({} horizontal / {} vertical samples), using defaults",
                h_count, v_count
            );
        }

        Ok(Some(baseline))
    }
}
