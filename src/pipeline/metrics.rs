// src/pipeline/metrics.rs
//
// Session counters. Cheap to clone and safe to read from another thread
// while the session loop is running.

use crate::detection::GazeDirection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SessionMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub center_frames: Arc<AtomicU64>,
    pub offcenter_frames: Arc<AtomicU64>,
    pub blink_frames: Arc<AtomicU64>,
    pub uncalibrated_frames: Arc<AtomicU64>,
    pub detections: Arc<AtomicU64>,
    pub manual_marks: Arc<AtomicU64>,
    pub flush_failures: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            center_frames: Arc::new(AtomicU64::new(0)),
            offcenter_frames: Arc::new(AtomicU64::new(0)),
            blink_frames: Arc::new(AtomicU64::new(0)),
            uncalibrated_frames: Arc::new(AtomicU64::new(0)),
            detections: Arc::new(AtomicU64::new(0)),
            manual_marks: Arc::new(AtomicU64::new(0)),
            flush_failures: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self, direction: GazeDirection) {
        self.inc(&self.total_frames);
        let bucket = match direction {
            GazeDirection::Blink => &self.blink_frames,
            GazeDirection::NotCalibrated => &self.uncalibrated_frames,
            d if d.is_center() => &self.center_frames,
            _ => &self.offcenter_frames,
        };
        self.inc(bucket);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let total = self.total_frames.load(Ordering::Relaxed);
        let offcenter = self.offcenter_frames.load(Ordering::Relaxed);
        MetricsSummary {
            total_frames: total,
            center_frames: self.center_frames.load(Ordering::Relaxed),
            offcenter_frames: offcenter,
            blink_frames: self.blink_frames.load(Ordering::Relaxed),
            uncalibrated_frames: self.uncalibrated_frames.load(Ordering::Relaxed),
            offcenter_share: if total > 0 {
                offcenter as f64 / total as f64
            } else {
                0.0
            },
            detections: self.detections.load(Ordering::Relaxed),
            manual_marks: self.manual_marks.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            fps: self.fps(),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub center_frames: u64,
    pub offcenter_frames: u64,
    pub blink_frames: u64,
    pub uncalibrated_frames: u64,
    pub offcenter_share: f64,
    pub detections: u64,
    pub manual_marks: u64,
    pub flush_failures: u64,
    pub fps: f64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{HorizontalDeviation, VerticalDeviation};

    #[test]
    fn test_frames_bucketed_by_direction() {
        let metrics = SessionMetrics::new();
        metrics.record_frame(GazeDirection::CENTER);
        metrics.record_frame(GazeDirection::Blink);
        metrics.record_frame(GazeDirection::NotCalibrated);
        metrics.record_frame(GazeDirection::new(
            HorizontalDeviation::None,
            VerticalDeviation::Down,
        ));

        let summary = metrics.summary();
        assert_eq!(summary.total_frames, 4);
        assert_eq!(summary.center_frames, 1);
        assert_eq!(summary.offcenter_frames, 1);
        assert_eq!(summary.blink_frames, 1);
        assert_eq!(summary.uncalibrated_frames, 1);
        assert!((summary.offcenter_share - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = SessionMetrics::new();
        let view = metrics.clone();
        metrics.inc(&metrics.manual_marks);
        assert_eq!(view.summary().manual_marks, 1);
        assert_eq!(SessionMetrics::default().summary().offcenter_share, 0.0);
    }
}
