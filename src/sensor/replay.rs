// src/sensor/replay.rs
//
// JSON-lines feed of estimator output interleaved with operator commands.
// Lets a recorded session (or an estimator process piping into stdin)
// drive the pipeline exactly like a live camera would.
//
//   {"horizontal_ratio": 0.52, "vertical_ratio": 0.48, "blinking": false}
//   {"command": "mark"}

use super::{FeedItem, FrameSource, GazeEstimator, SessionCommand};
use crate::error::CaptureError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Everything the external estimator reports for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EstimatorReading {
    pub horizontal_ratio: Option<f64>,
    pub vertical_ratio: Option<f64>,
    pub pupil_left: Option<(i32, i32)>,
    pub pupil_right: Option<(i32, i32)>,
    #[serde(default)]
    pub blinking: bool,
}

impl EstimatorReading {
    pub fn looking_at(horizontal: f64, vertical: f64) -> Self {
        Self {
            horizontal_ratio: Some(horizontal),
            vertical_ratio: Some(vertical),
            ..Default::default()
        }
    }

    pub fn blink() -> Self {
        Self {
            blinking: true,
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedLine {
    Command { command: SessionCommand },
    Frame(EstimatorReading),
}

pub struct JsonlFeed<R> {
    reader: R,
    line_no: usize,
    buf: String,
}

impl JsonlFeed<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        debug!("Opening replay feed {}", path.display());
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> JsonlFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            buf: String::new(),
        }
    }

    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> FrameSource for JsonlFeed<R> {
    type Frame = EstimatorReading;

    fn next_item(&mut self) -> Result<Option<FeedItem<EstimatorReading>>, CaptureError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }

            let parsed: FeedLine =
                serde_json::from_str(line).map_err(|source| CaptureError::Malformed {
                    line: self.line_no,
                    source,
                })?;

            return Ok(Some(match parsed {
                FeedLine::Command { command } => FeedItem::Command(command),
                FeedLine::Frame(reading) => FeedItem::Frame(reading),
            }));
        }
    }
}

/// Estimator that replays readings produced upstream.
#[derive(Debug, Default)]
pub struct RecordedEstimator {
    current: EstimatorReading,
}

impl RecordedEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

fn usable_ratio(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl GazeEstimator for RecordedEstimator {
    type Frame = EstimatorReading;

    fn refresh(&mut self, frame: &EstimatorReading) {
        self.current = frame.clone();
    }

    fn horizontal_ratio(&self) -> Option<f64> {
        usable_ratio(self.current.horizontal_ratio)
    }

    fn vertical_ratio(&self) -> Option<f64> {
        usable_ratio(self.current.vertical_ratio)
    }

    fn pupil_left_coords(&self) -> Option<(i32, i32)> {
        self.current.pupil_left
    }

    fn pupil_right_coords(&self) -> Option<(i32, i32)> {
        self.current.pupil_right
    }

    fn is_blinking(&self) -> bool {
        self.current.blinking
    }
}
