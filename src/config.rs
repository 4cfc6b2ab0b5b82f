// src/config.rs

use crate::types::Config;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Upper bound for the derived window and streak lengths, in frames
pub const MAX_FRAMES: usize = 1_000_000;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means "use the defaults".
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Config file {} not found, using default values",
                path.display()
            );
            return Ok(Config::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.tracking;
        let a = &self.analysis;

        if !(t.sample_interval > 0.0) {
            bail!("tracking.sample_interval must be positive");
        }
        if !(t.calibration_time > 0.0) {
            bail!("tracking.calibration_time must be positive");
        }
        if !(t.calibration_threshold >= 0.0) {
            bail!("tracking.calibration_threshold must not be negative");
        }
        if !(a.analysis_window > 0.0) {
            bail!("analysis.analysis_window must be positive");
        }
        if !(a.min_consecutive_offcenter_seconds > 0.0) {
            bail!("analysis.min_consecutive_offcenter_seconds must be positive");
        }
        if a.max_suspicious_actions == 0 {
            bail!("analysis.max_suspicious_actions must be at least 1");
        }
        for (name, seconds) in [
            ("analysis.analysis_window", a.analysis_window),
            (
                "analysis.min_consecutive_offcenter_seconds",
                a.min_consecutive_offcenter_seconds,
            ),
        ] {
            if seconds / t.sample_interval > MAX_FRAMES as f64 {
                bail!(
                    "{} spans more than {} frames at the configured sample_interval",
                    name,
                    MAX_FRAMES
                );
            }
        }
        tolerance_from_secs(self.correlation.tolerance_seconds)
            .context("correlation.tolerance_seconds")?;
        if let Some(fraction) = a.offcenter_fraction_threshold {
            if !(fraction > 0.0 && fraction <= 1.0) {
                bail!("analysis.offcenter_fraction_threshold must be in (0, 1]");
            }
        }
        Ok(())
    }

    /// Sliding window capacity in frames
    pub fn window_size(&self) -> usize {
        frames_for(self.analysis.analysis_window, self.tracking.sample_interval)
    }

    /// Off-center streak length (frames) that earns one suspicion unit
    pub fn min_consecutive_offcenter(&self) -> u32 {
        let frames = frames_for(
            self.analysis.min_consecutive_offcenter_seconds,
            self.tracking.sample_interval,
        );
        u32::try_from(frames).unwrap_or(u32::MAX)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tracking.sample_interval)
    }

    pub fn calibration_duration(&self) -> Duration {
        Duration::from_secs_f64(self.tracking.calibration_time)
    }

    pub fn correlation_tolerance(&self) -> Result<chrono::Duration> {
        tolerance_from_secs(self.correlation.tolerance_seconds)
    }

    pub fn gaze_log_path(&self) -> PathBuf {
        Path::new(&self.logging.logs_dir).join(&self.logging.gaze_log_file)
    }

    pub fn behavior_log_path(&self) -> PathBuf {
        Path::new(&self.logging.logs_dir).join(&self.logging.behavior_log_file)
    }
}

/// Correlation tolerance as a duration; fails instead of wrapping or
/// overflowing for huge values.
pub fn tolerance_from_secs(seconds: u64) -> Result<chrono::Duration> {
    i64::try_from(seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .with_context(|| format!("tolerance of {} seconds is out of range", seconds))
}

fn frames_for(seconds: f64, sample_interval: f64) -> usize {
    ((seconds / sample_interval).round() as usize).max(1)
}
