// src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
    pub correlation: CorrelationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Log a text overlay for every classified frame
    pub debug: bool,
    /// Ratio deviation from the calibrated center that counts as looking away
    pub calibration_threshold: f64,
    /// Seconds of timed sampling once the subject signals ready
    pub calibration_time: f64,
    /// Seconds between two sampled frames
    pub sample_interval: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            debug: true,
            calibration_threshold: 0.10,
            calibration_time: 10.0,
            sample_interval: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_suspicious_actions: u32,
    /// Seconds of gaze history kept in the sliding window
    pub analysis_window: f64,
    pub min_consecutive_offcenter_seconds: f64,
    /// Optional share of off-center frames in a full window that also awards suspicion
    pub offcenter_fraction_threshold: Option<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_suspicious_actions: 10,
            analysis_window: 20.0,
            min_consecutive_offcenter_seconds: 2.0,
            offcenter_fraction_threshold: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub logs_dir: String,
    pub gaze_log_file: String,
    pub behavior_log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            logs_dir: "logs".to_string(),
            gaze_log_file: "gaze_log.txt".to_string(),
            behavior_log_file: "behavior_log.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Seconds after a manual mark in which a detection corroborates it
    pub tolerance_seconds: u64,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            tolerance_seconds: 10,
        }
    }
}
