// src/tracker.rs
//
// Capture → estimator → classifier for one subject. Owns the calibrated
// baseline so every frame after calibration is judged against it.

use crate::detection::{
    CalibrationBaseline, Calibrator, DirectionClassifier, GazeDirection, RatioSample, ReadyWait,
};
use crate::error::CaptureError;
use crate::sensor::{FeedItem, FrameSource, GazeEstimator, SessionCommand};
use crate::types::Config;
use std::collections::VecDeque;
use tracing::info;

/// Everything known about one classified frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GazeReading {
    pub direction: GazeDirection,
    pub ratios: RatioSample,
    pub pupil_left: Option<(i32, i32)>,
    pub pupil_right: Option<(i32, i32)>,
    pub blinking: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerItem {
    Gaze(GazeReading),
    Command(SessionCommand),
}

/// How calibration ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationOutcome {
    Calibrated(CalibrationBaseline),
    /// No usable samples; the default baseline stays in place
    Failed,
    Stopped,
    EndOfStream,
}

pub struct GazeTracker<S, E> {
    source: S,
    estimator: E,
    calibrator: Calibrator,
    classifier: DirectionClassifier,
    baseline: CalibrationBaseline,
    /// Commands read while calibrating, replayed before the next feed item
    pending: VecDeque<SessionCommand>,
}

impl<S, E> GazeTracker<S, E>
where
    S: FrameSource,
    E: GazeEstimator<Frame = S::Frame>,
{
    pub fn new(
        source: S,
        estimator: E,
        calibrator: Calibrator,
        classifier: DirectionClassifier,
    ) -> Self {
        Self {
            source,
            estimator,
            calibrator,
            classifier,
            baseline: CalibrationBaseline::default(),
            pending: VecDeque::new(),
        }
    }

    pub fn from_config(source: S, estimator: E, config: &Config) -> Self {
        Self::new(
            source,
            estimator,
            Calibrator::from_config(config),
            DirectionClassifier::new(config.tracking.calibration_threshold),
        )
    }

    pub fn baseline(&self) -> &CalibrationBaseline {
        &self.baseline
    }

    /// Wait for the ready trigger, then sample the subject's center.
    pub fn calibrate(&mut self) -> Result<CalibrationOutcome, CaptureError> {
        match self
            .calibrator
            .wait_for_ready(&mut self.source, &mut self.estimator, &mut self.pending)?
        {
            ReadyWait::Ready => {}
            ReadyWait::Stopped => {
                info!("🛑 Stopped before calibration");
                return Ok(CalibrationOutcome::Stopped);
            }
            ReadyWait::EndOfStream => return Ok(CalibrationOutcome::EndOfStream),
        }

        let Some(baseline) = self
            .calibrator
            .calibrate(&mut self.source, &mut self.estimator, &mut self.pending)?
        else {
            return Ok(CalibrationOutcome::EndOfStream);
        };

        self.baseline = baseline;
        Ok(if baseline.calibrated {
            CalibrationOutcome::Calibrated(baseline)
        } else {
            CalibrationOutcome::Failed
        })
    }

    /// Oldest command held back during calibration, if any
    pub fn pending_command(&mut self) -> Option<SessionCommand> {
        self.pending.pop_front()
    }

    /// Read the next feed item; frames come back classified. Commands held
    /// back during calibration are returned first.
    pub fn detect_gaze(&mut self) -> Result<Option<TrackerItem>, CaptureError> {
        if let Some(command) = self.pending.pop_front() {
            return Ok(Some(TrackerItem::Command(command)));
        }

        let item = match self.source.next_item()? {
            Some(FeedItem::Frame(frame)) => {
                self.estimator.refresh(&frame);
                let ratios = self.estimator.ratios();
                TrackerItem::Gaze(GazeReading {
                    direction: self.classifier.classify(ratios, &self.baseline),
                    ratios,
                    pupil_left: self.estimator.pupil_left_coords(),
                    pupil_right: self.estimator.pupil_right_coords(),
                    blinking: self.estimator.is_blinking(),
                })
            }
            Some(FeedItem::Command(command)) => TrackerItem::Command(command),
            None => return Ok(None),
        };
        Ok(Some(item))
    }

    pub fn eye_positions(&self) -> (Option<(i32, i32)>, Option<(i32, i32)>) {
        (
            self.estimator.pupil_left_coords(),
            self.estimator.pupil_right_coords(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{HorizontalDeviation, VerticalDeviation};
    use crate::sensor::{JsonlFeed, RecordedEstimator};
    use std::io::Cursor;
    use std::time::Duration;

    fn tracker(text: &str) -> GazeTracker<JsonlFeed<Cursor<Vec<u8>>>, RecordedEstimator> {
        GazeTracker::new(
            JsonlFeed::new(Cursor::new(text.as_bytes().to_vec())),
            RecordedEstimator::new(),
            Calibrator::new(Duration::from_millis(20), Duration::from_millis(1)),
            DirectionClassifier::new(0.1),
        )
    }

    fn repeat(line: &str, n: usize) -> String {
        format!("{}\n", line).repeat(n)
    }

    #[test]
    fn test_uncalibrated_tracker_reports_not_calibrated() {
        let mut tracker = tracker("{\"horizontal_ratio\": 0.9, \"vertical_ratio\": 0.5}\n");
        match tracker.detect_gaze().unwrap() {
            Some(TrackerItem::Gaze(reading)) => {
                assert_eq!(reading.direction, GazeDirection::NotCalibrated)
            }
            other => panic!("expected gaze, got {:?}", other),
        }
        assert!(tracker.detect_gaze().unwrap().is_none());
    }

    #[test]
    fn test_calibrate_then_classify_against_baseline() {
        let mut text = String::from("{\"command\": \"ready\"}\n");
        text.push_str(&repeat(
            "{\"horizontal_ratio\": 0.6, \"vertical_ratio\": 0.4}",
            500,
        ));
        let mut tracker = tracker(&text);

        let outcome = tracker.calibrate().unwrap();
        assert!(matches!(outcome, CalibrationOutcome::Calibrated(_)));
        assert!((tracker.baseline().horizontal_center - 0.6).abs() < 1e-9);

        match tracker.detect_gaze().unwrap() {
            Some(TrackerItem::Gaze(reading)) => assert!(reading.direction.is_center()),
            other => panic!("expected gaze, got {:?}", other),
        }
    }

    #[test]
    fn test_calibration_with_only_blinks_fails() {
        let mut text = String::from("{\"command\": \"ready\"}\n");
        text.push_str(&repeat("{\"blinking\": true}", 500));
        let mut tracker = tracker(&text);

        assert_eq!(tracker.calibrate().unwrap(), CalibrationOutcome::Failed);
        assert!(!tracker.baseline().calibrated);
    }

    #[test]
    fn test_stop_before_ready() {
        let mut tracker = tracker("{\"horizontal_ratio\": 0.5}\n{\"command\": \"stop\"}\n");
        assert_eq!(tracker.calibrate().unwrap(), CalibrationOutcome::Stopped);

        let mut tracker = tracker_end_of_stream();
        assert_eq!(tracker.calibrate().unwrap(), CalibrationOutcome::EndOfStream);
    }

    #[test]
    fn test_commands_during_calibration_come_back_first() {
        let mut text = String::from("{\"command\": \"mark\"}\n{\"command\": \"ready\"}\n");
        text.push_str("{\"horizontal_ratio\": 0.5, \"vertical_ratio\": 0.5}\n");
        text.push_str("{\"command\": \"debug\"}\n");
        text.push_str(&repeat(
            "{\"horizontal_ratio\": 0.5, \"vertical_ratio\": 0.5}",
            500,
        ));
        let mut tracker = tracker(&text);
        tracker.calibrate().unwrap();

        assert_eq!(
            tracker.detect_gaze().unwrap(),
            Some(TrackerItem::Command(SessionCommand::Mark))
        );
        assert_eq!(tracker.pending_command(), Some(SessionCommand::Debug));
        assert_eq!(tracker.pending_command(), None);
        assert!(matches!(
            tracker.detect_gaze().unwrap(),
            Some(TrackerItem::Gaze(_))
        ));
    }

    fn tracker_end_of_stream() -> GazeTracker<JsonlFeed<Cursor<Vec<u8>>>, RecordedEstimator> {
        tracker("{\"command\": \"ready\"}\n{\"horizontal_ratio\": 0.5}\n")
    }

    #[test]
    fn test_frame_details_and_commands_pass_through() {
        let mut text = String::from("{\"command\": \"ready\"}\n");
        text.push_str(&repeat(
            "{\"horizontal_ratio\": 0.5, \"vertical_ratio\": 0.5}",
            500,
        ));
        text.push_str(
            "{\"horizontal_ratio\": 0.7, \"vertical_ratio\": 0.3, \"pupil_left\": [1, 2]}\n\
             {\"command\": \"mark\"}\n",
        );
        let mut tracker = tracker(&text);
        tracker.calibrate().unwrap();

        // Drain whatever calibration left unread
        let mut last_gaze = None;
        let mut command = None;
        while let Some(item) = tracker.detect_gaze().unwrap() {
            match item {
                TrackerItem::Gaze(reading) => last_gaze = Some(reading),
                TrackerItem::Command(c) => command = Some(c),
            }
        }

        let reading = last_gaze.unwrap();
        assert_eq!(
            reading.direction,
            GazeDirection::new(HorizontalDeviation::Left, VerticalDeviation::Up)
        );
        assert_eq!(reading.pupil_left, Some((1, 2)));
        assert_eq!(tracker.eye_positions(), (Some((1, 2)), None));
        assert_eq!(command, Some(SessionCommand::Mark));
    }
}
