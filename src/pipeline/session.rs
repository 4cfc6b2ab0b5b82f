// src/pipeline/session.rs
//
// One proctored subject from start record to final flush.
//
//   start record → ready → calibration → per frame:
//       classify → score → gaze log → (flagged) behavior report
//   operator commands between frames: mark, debug toggle, stop
//   (commands sent during calibration are handled once it ends)
//
// Logs are flushed at start, on every manual mark and once more on every
// exit path.

use super::metrics::{MetricsSummary, SessionMetrics};
use crate::analysis::SuspicionEngine;
use crate::debug::overlay_text;
use crate::detection::CalibrationBaseline;
use crate::evidence::record::now;
use crate::evidence::{EvidenceStore, IncidentRecord};
use crate::sensor::{FrameSource, GazeEstimator, SessionCommand};
use crate::tracker::{CalibrationOutcome, GazeReading, GazeTracker, TrackerItem};
use crate::types::Config;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// Operator stop command
    Stopped,
    /// Stop flag raised from outside the loop
    Interrupted,
    EndOfStream,
    CaptureFailed,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub participant: String,
    pub end: SessionEnd,
    pub baseline: CalibrationBaseline,
    pub metrics: MetricsSummary,
}

pub struct Session<S, E> {
    participant: String,
    tracker: GazeTracker<S, E>,
    engine: SuspicionEngine,
    store: Arc<EvidenceStore>,
    metrics: SessionMetrics,
    sample_interval: Duration,
    debug_overlay: bool,
    stop: Arc<AtomicBool>,
}

impl<S, E> Session<S, E>
where
    S: FrameSource,
    E: GazeEstimator<Frame = S::Frame>,
{
    pub fn new(
        participant: impl Into<String>,
        tracker: GazeTracker<S, E>,
        engine: SuspicionEngine,
        store: Arc<EvidenceStore>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            participant: participant.into(),
            tracker,
            engine,
            store,
            metrics: SessionMetrics::new(),
            sample_interval,
            debug_overlay: false,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(
        participant: impl Into<String>,
        source: S,
        estimator: E,
        store: Arc<EvidenceStore>,
        config: &Config,
    ) -> Self {
        let mut session = Self::new(
            participant,
            GazeTracker::from_config(source, estimator, config),
            SuspicionEngine::from_config(config),
            store,
            config.sample_interval(),
        );
        session.debug_overlay = config.tracking.debug;
        session
    }

    /// Raise to end the session before the next frame
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics.clone()
    }

    pub fn debug_overlay(&self) -> bool {
        self.debug_overlay
    }

    pub fn run(mut self) -> Result<SessionSummary> {
        self.start()?;

        let end = match self.calibrate() {
            Some(end) => end,
            None => self.monitor(),
        };

        self.finish(end)
    }

    fn start(&mut self) -> Result<()> {
        let ts = now();
        info!("👤 Session started for participant {}", self.participant);
        self.store
            .log_note(ts, &format!("Participant number: {}", self.participant));
        self.store
            .append_event(IncidentRecord::session_start(ts, self.participant.clone()));
        self.store
            .flush()
            .context("Failed to write session start record")?;
        Ok(())
    }

    /// `Some(end)` when the session is over before monitoring starts
    fn calibrate(&mut self) -> Option<SessionEnd> {
        match self.tracker.calibrate() {
            Ok(CalibrationOutcome::Calibrated(_)) => {
                info!("✓ Monitoring started. Send a stop command to finish");
                None
            }
            Ok(CalibrationOutcome::Failed) => {
                warn!("⚠️  Monitoring uncalibrated, frames will not be classified");
                None
            }
            Ok(CalibrationOutcome::Stopped) => self.end_early(SessionEnd::Stopped),
            Ok(CalibrationOutcome::EndOfStream) => self.end_early(SessionEnd::EndOfStream),
            Err(e) => {
                error!("❌ Capture failed during calibration: {}", e);
                self.end_early(SessionEnd::CaptureFailed)
            }
        }
    }

    /// Marks the operator sent before monitoring began still count
    fn end_early(&mut self, end: SessionEnd) -> Option<SessionEnd> {
        while let Some(command) = self.tracker.pending_command() {
            self.handle_command(command);
        }
        Some(end)
    }

    fn monitor(&mut self) -> SessionEnd {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                info!("🛑 Stop requested");
                return SessionEnd::Interrupted;
            }

            let item = match self.tracker.detect_gaze() {
                Ok(Some(item)) => item,
                Ok(None) => {
                    info!("Frame source ended");
                    return SessionEnd::EndOfStream;
                }
                Err(e) => {
                    error!("❌ Capture failed: {}", e);
                    return SessionEnd::CaptureFailed;
                }
            };

            match item {
                TrackerItem::Gaze(reading) => {
                    self.process_frame(&reading);
                    thread::sleep(self.sample_interval);
                }
                TrackerItem::Command(command) => {
                    if let Some(end) = self.handle_command(command) {
                        return end;
                    }
                }
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) -> Option<SessionEnd> {
        match command {
            SessionCommand::Mark => self.mark(),
            SessionCommand::Debug => {
                self.debug_overlay = !self.debug_overlay;
                info!(
                    "Debug overlay {}",
                    if self.debug_overlay { "on" } else { "off" }
                );
            }
            SessionCommand::Stop => {
                info!("🛑 Stop command received");
                return Some(SessionEnd::Stopped);
            }
            SessionCommand::Ready => debug!("Already calibrated, ready ignored"),
        }
        None
    }

    fn process_frame(&mut self, reading: &GazeReading) {
        let ts = now();
        let direction = reading.direction;

        self.metrics.record_frame(direction);
        if self.debug_overlay {
            info!("🔍 {}", overlay_text(reading));
        }

        self.engine.observe_at(ts, direction);
        self.store.log_gaze(ts, direction);

        if self.engine.is_flagged() {
            let report = self.engine.generate_report();
            warn!(
                "🚨 Suspicious behavior: {} suspicious actions over {} frames",
                report.suspicious_actions,
                report.gaze_history.len()
            );
            self.metrics.inc(&self.metrics.detections);
            self.store.log_behavior(ts, report);
        }
    }

    fn mark(&mut self) {
        let ts = now();
        self.store
            .log_note(ts, "Cheating attempt marked by operator");
        self.store.append_event(IncidentRecord::manual_mark(ts));
        self.metrics.inc(&self.metrics.manual_marks);
        info!("✍️  Cheating attempt marked");
        self.flush();
    }

    fn flush(&self) {
        if let Err(e) = self.store.flush() {
            self.metrics.inc(&self.metrics.flush_failures);
            warn!("⚠️  Failed to flush evidence logs, will retry: {}", e);
        }
    }

    fn finish(self, end: SessionEnd) -> Result<SessionSummary> {
        self.store
            .flush()
            .context("Failed to flush evidence logs at session end")?;

        let summary = SessionSummary {
            participant: self.participant,
            end,
            baseline: *self.tracker.baseline(),
            metrics: self.metrics.summary(),
        };

        info!("\n📊 Session Report:");
        info!("  Participant: {}", summary.participant);
        info!("  Ended: {:?}", summary.end);
        info!("  Frames: {}", summary.metrics.total_frames);
        info!(
            "  Off-center: {} ({:.1}%)",
            summary.metrics.offcenter_frames,
            100.0 * summary.metrics.offcenter_share
        );
        info!("  🚨 Detections: {}", summary.metrics.detections);
        info!("  ✍️  Manual marks: {}", summary.metrics.manual_marks);
        if summary.metrics.flush_failures > 0 {
            warn!("  ⚠️  Flush failures: {}", summary.metrics.flush_failures);
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{load_incident_log, EvidenceCorrelator};
    use crate::sensor::{JsonlFeed, RecordedEstimator};
    use std::fs;
    use std::io::Cursor;
    use std::path::Path;
    use tempfile::tempdir;

    const CENTER: &str = r#"{"horizontal_ratio": 0.5, "vertical_ratio": 0.5}"#;
    const LEFT: &str = r#"{"horizontal_ratio": 0.8, "vertical_ratio": 0.5}"#;
    const BLINK: &str = r#"{"blinking": true}"#;

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.tracking.debug = false;
        config.tracking.calibration_time = 0.02;
        config.tracking.sample_interval = 0.001;
        config.analysis.analysis_window = 0.01;
        config.analysis.min_consecutive_offcenter_seconds = 0.003;
        config.analysis.max_suspicious_actions = 2;
        config.logging.logs_dir = dir.join("logs").display().to_string();
        config
    }

    /// Ready, plenty of frames for calibration, then a blink so leftover
    /// centered frames do not carry into the streak counter.
    fn script(after_calibration: &[&str]) -> String {
        let mut lines = vec![r#"{"command": "ready"}"#];
        lines.extend(std::iter::repeat(CENTER).take(300));
        lines.push(BLINK);
        lines.extend_from_slice(after_calibration);
        lines.join("\n")
    }

    fn session(
        text: String,
        config: &Config,
    ) -> (
        Session<JsonlFeed<Cursor<Vec<u8>>>, RecordedEstimator>,
        Arc<EvidenceStore>,
    ) {
        let store = Arc::new(EvidenceStore::from_config(config));
        let session = Session::from_config(
            "12",
            JsonlFeed::new(Cursor::new(text.into_bytes())),
            RecordedEstimator::new(),
            store.clone(),
            config,
        );
        (session, store)
    }

    #[test]
    fn test_sustained_deviation_is_logged_and_corroborated() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let text = script(&[
            r#"{"command": "mark"}"#,
            LEFT,
            LEFT,
            LEFT,
            LEFT,
            LEFT,
            LEFT,
            r#"{"command": "stop"}"#,
            CENTER,
        ]);
        let (session, store) = session(text, &config);

        let summary = session.run().unwrap();
        assert_eq!(summary.end, SessionEnd::Stopped);
        assert!(summary.baseline.calibrated);
        assert_eq!(summary.metrics.detections, 1);
        assert_eq!(summary.metrics.manual_marks, 1);
        assert_eq!(summary.metrics.offcenter_frames, 6);
        assert_eq!(store.pending(), (0, 0));

        let records = load_incident_log(&config.behavior_log_path()).unwrap();
        let kinds: Vec<_> = records.iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec!["session_start", "manual_mark", "detection"]);

        let results = EvidenceCorrelator::from_config(&config)
            .unwrap()
            .correlate(&records);
        assert_eq!(results["12"].detected_attempts, 1);
        assert_eq!(results["12"].false_positives, 0);

        let gaze_log = fs::read_to_string(config.gaze_log_path()).unwrap();
        let lines: Vec<&str> = gaze_log.lines().collect();
        assert!(lines[0].ends_with(": Participant number: 12"));
        assert!(lines[lines.len() - 1].ends_with(": left"));
        assert!(gaze_log.contains(": Cheating attempt marked by operator\n"));
        assert!(gaze_log.contains(": blink\n"));
    }

    #[test]
    fn test_stop_before_ready_still_records_start() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let (session, _) = session(r#"{"command": "stop"}"#.to_string(), &config);

        let summary = session.run().unwrap();
        assert_eq!(summary.end, SessionEnd::Stopped);
        assert!(!summary.baseline.calibrated);
        assert_eq!(summary.metrics.total_frames, 0);

        let records = load_incident_log(&config.behavior_log_path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), "session_start");
    }

    #[test]
    fn test_stop_flag_ends_before_next_frame() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let (session, _) = session(script(&[LEFT, LEFT]), &config);

        session.stop_handle().store(true, Ordering::Relaxed);
        let metrics = session.metrics();
        let summary = session.run().unwrap();
        assert_eq!(summary.end, SessionEnd::Interrupted);
        assert_eq!(metrics.summary().total_frames, 0);
    }

    #[test]
    fn test_capture_failure_ends_session_and_flushes() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let (session, store) = session(script(&[LEFT, "not json", LEFT]), &config);

        let summary = session.run().unwrap();
        assert_eq!(summary.end, SessionEnd::CaptureFailed);
        assert_eq!(store.pending(), (0, 0));

        let gaze_log = fs::read_to_string(config.gaze_log_path()).unwrap();
        assert!(gaze_log.trim_end().ends_with(": left"));
    }

    #[test]
    fn test_failed_calibration_never_flags() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let mut lines = vec![r#"{"command": "ready"}"#];
        lines.extend(std::iter::repeat(BLINK).take(300));
        lines.extend(std::iter::repeat(LEFT).take(10));
        let (session, _) = session(lines.join("\n"), &config);

        let summary = session.run().unwrap();
        assert_eq!(summary.end, SessionEnd::EndOfStream);
        assert!(!summary.baseline.calibrated);
        assert_eq!(summary.metrics.detections, 0);
        assert_eq!(summary.metrics.offcenter_frames, 0);
        assert!(summary.metrics.uncalibrated_frames >= 10);
    }

    #[test]
    fn test_mark_during_calibration_is_recorded() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let mut lines = vec![r#"{"command": "ready"}"#, CENTER, CENTER, CENTER];
        lines.push(r#"{"command": "mark"}"#);
        lines.extend(std::iter::repeat(CENTER).take(300));
        lines.push(r#"{"command": "stop"}"#);
        let (session, _) = session(lines.join("\n"), &config);

        let summary = session.run().unwrap();
        assert_eq!(summary.end, SessionEnd::Stopped);
        assert!(summary.baseline.calibrated);
        assert_eq!(summary.metrics.manual_marks, 1);

        let records = load_incident_log(&config.behavior_log_path()).unwrap();
        let kinds: Vec<_> = records.iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec!["session_start", "manual_mark"]);
    }

    #[test]
    fn test_mark_before_stream_ends_in_calibration_is_recorded() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let text = [r#"{"command": "ready"}"#, CENTER, r#"{"command": "mark"}"#].join("\n");
        let (session, _) = session(text, &config);

        let summary = session.run().unwrap();
        assert_eq!(summary.end, SessionEnd::EndOfStream);
        assert_eq!(summary.metrics.manual_marks, 1);
        assert_eq!(summary.metrics.total_frames, 0);

        let records = load_incident_log(&config.behavior_log_path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].kind(), "manual_mark");
    }

    #[test]
    fn test_debug_command_toggles_overlay() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.tracking.debug = true;
        let (session, _) = session(script(&[r#"{"command": "debug"}"#]), &config);
        assert!(session.debug_overlay());

        let summary = session.run().unwrap();
        assert_eq!(summary.end, SessionEnd::EndOfStream);
    }
}
