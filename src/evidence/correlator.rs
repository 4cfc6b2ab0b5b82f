// src/evidence/correlator.rs
//
// Offline accuracy pass over behavior logs.
//
// Every manual mark is checked for a detection of the same participant in
// [mark, mark + tolerance]. Detections are not consumed by a match, so one
// detection can corroborate several marks; false positives are then simply
// total detections minus corroborated marks and may come out negative.

use super::record::{IncidentData, IncidentRecord};
use crate::detection::GazeDirection;
use crate::types::Config;
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationResult {
    #[serde(rename = "manual_cheating_marks")]
    pub manual_marks: u32,
    #[serde(rename = "detected_cheating_attempts")]
    pub detected_attempts: u32,
    pub false_positives: i64,
    #[serde(rename = "gaze_directions", default)]
    pub gaze_direction_histogram: BTreeMap<GazeDirection, u32>,
}

impl CorrelationResult {
    /// Fold another log's result for the same participant into this one
    pub fn merge(&mut self, other: &CorrelationResult) {
        self.manual_marks += other.manual_marks;
        self.detected_attempts += other.detected_attempts;
        self.false_positives += other.false_positives;
        for (direction, count) in &other.gaze_direction_histogram {
            *self.gaze_direction_histogram.entry(*direction).or_insert(0) += count;
        }
    }

    /// Automatic detections behind this result
    pub fn total_detections(&self) -> i64 {
        self.detected_attempts as i64 + self.false_positives
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalStats {
    /// detected + false positives, i.e. every logged detection
    pub total_detected_attempts: i64,
    pub total_manual_marks: u64,
    pub total_real_attempts: u64,
    pub total_false_positives: i64,
}

impl TotalStats {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a CorrelationResult>) -> Self {
        results
            .into_iter()
            .fold(TotalStats::default(), |mut totals, result| {
                totals.total_detected_attempts += result.total_detections();
                totals.total_manual_marks += result.manual_marks as u64;
                totals.total_real_attempts += result.detected_attempts as u64;
                totals.total_false_positives += result.false_positives;
                totals
            })
    }
}

/// Most frequent label in a detection's history; ties go to the label seen
/// first. `None` for an empty history.
pub fn dominant_direction(history: &[GazeDirection]) -> Option<GazeDirection> {
    let mut counts: Vec<(GazeDirection, u32)> = Vec::new();
    for direction in history {
        match counts.iter_mut().find(|(d, _)| d == direction) {
            Some((_, count)) => *count += 1,
            None => counts.push((*direction, 1)),
        }
    }

    let mut best: Option<(GazeDirection, u32)> = None;
    for (direction, count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((direction, count));
        }
    }
    best.map(|(direction, _)| direction)
}

pub struct EvidenceCorrelator {
    tolerance: Duration,
}

impl Default for EvidenceCorrelator {
    fn default() -> Self {
        Self::new(Duration::seconds(10))
    }
}

impl EvidenceCorrelator {
    pub fn new(tolerance: Duration) -> Self {
        Self { tolerance }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.correlation_tolerance()?))
    }

    pub fn tolerance(&self) -> Duration {
        self.tolerance
    }

    pub fn correlate(&self, records: &[IncidentRecord]) -> BTreeMap<String, CorrelationResult> {
        let mut ordered: Vec<&IncidentRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.timestamp);

        let mut results: BTreeMap<String, CorrelationResult> = BTreeMap::new();
        let mut marks: Vec<(NaiveDateTime, &str)> = Vec::new();
        let mut detections: Vec<(NaiveDateTime, &str)> = Vec::new();
        let mut current: Option<&str> = None;

        for record in ordered {
            match &record.data {
                IncidentData::SessionStart {
                    participant_number, ..
                } => {
                    current = Some(participant_number.as_str());
                    results.entry(participant_number.clone()).or_default();
                }
                IncidentData::ManualMark { .. } => {
                    let Some(participant) = current else {
                        debug!("Mark at {} precedes any session start, skipped", record.timestamp);
                        continue;
                    };
                    marks.push((record.timestamp, participant));
                    results.entry(participant.to_string()).or_default().manual_marks += 1;
                }
                IncidentData::Detection(report) => {
                    let Some(participant) = current else {
                        debug!(
                            "Detection at {} precedes any session start, skipped",
                            record.timestamp
                        );
                        continue;
                    };
                    detections.push((record.timestamp, participant));
                    if let Some(direction) = dominant_direction(&report.gaze_history) {
                        *results
                            .entry(participant.to_string())
                            .or_default()
                            .gaze_direction_histogram
                            .entry(direction)
                            .or_insert(0) += 1;
                    }
                }
            }
        }

        for (mark_time, participant) in &marks {
            let corroborated = detections.iter().any(|(time, who)| {
                who == participant && *time >= *mark_time && *time - *mark_time <= self.tolerance
            });
            if corroborated {
                if let Some(result) = results.get_mut(*participant) {
                    result.detected_attempts += 1;
                }
            }
        }

        for (participant, result) in results.iter_mut() {
            let total = detections
                .iter()
                .filter(|(_, who)| *who == participant.as_str())
                .count() as i64;
            result.false_positives = total - result.detected_attempts as i64;
        }

        results
    }

    /// Correlate one log file, or every `*.json` log under a directory.
    /// Per-participant results from separate files are summed.
    pub fn correlate_path(&self, path: &Path) -> Result<BTreeMap<String, CorrelationResult>> {
        if !path.is_dir() {
            let records = load_incident_log(path)?;
            return Ok(self.correlate(&records));
        }

        let mut combined: BTreeMap<String, CorrelationResult> = BTreeMap::new();
        let mut files = 0usize;

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            let file = entry.path();
            if !entry.file_type().is_file()
                || file.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }

            let records = match load_incident_log(file) {
                Ok(records) => records,
                Err(e) => {
                    warn!("⚠️  Skipping {}: {:#}", file.display(), e);
                    continue;
                }
            };
            files += 1;
            for (participant, result) in self.correlate(&records) {
                combined.entry(participant).or_default().merge(&result);
            }
        }

        info!(
            "📂 Correlated {} log file(s) under {}, {} participant(s)",
            files,
            path.display(),
            combined.len()
        );
        Ok(combined)
    }
}

/// Read a behavior log. Array elements that are not a known record kind are
/// skipped.
pub fn load_incident_log(path: &Path) -> Result<Vec<IncidentRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read behavior log {}", path.display()))?;
    let entries: Vec<Value> = serde_json::from_str(&text)
        .with_context(|| format!("Behavior log {} is not a JSON array", path.display()))?;

    let total = entries.len();
    let records: Vec<IncidentRecord> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Entry {} of {} skipped: {}", index, path.display(), e);
                None
            }
        })
        .collect();

    debug!(
        "Loaded {}/{} records from {}",
        records.len(),
        total,
        path.display()
    );
    Ok(records)
}

/// Per-participant results previously saved by `correlate --output`
pub fn load_stats(path: &Path) -> Result<BTreeMap<String, CorrelationResult>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read stats {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse stats {}", path.display()))
}

pub fn total_stats(results: &BTreeMap<String, CorrelationResult>) -> TotalStats {
    TotalStats::from_results(results.values())
}
