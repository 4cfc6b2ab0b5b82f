// src/evidence/store.rs
//
// Buffered evidence logs. Appends stay in memory until flush():
//   gaze log     → text lines appended to the file
//   behavior log → JSON array read, extended and rewritten whole
// Each log has its own lock, so flushes of the same file are serialized
// while the two files never wait on each other.

use super::record::{format_timestamp, IncidentRecord};
use crate::analysis::BehaviorReport;
use crate::detection::GazeDirection;
use crate::error::EvidenceError;
use crate::types::Config;
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

struct GazeLog {
    path: PathBuf,
    pending: Vec<String>,
}

struct BehaviorLog {
    path: PathBuf,
    pending: Vec<IncidentRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub gaze_lines: usize,
    pub behavior_records: usize,
}

pub struct EvidenceStore {
    gaze: Mutex<GazeLog>,
    behavior: Mutex<BehaviorLog>,
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> EvidenceError + '_ {
    move |source| EvidenceError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn ensure_parent(path: &Path) -> Result<(), EvidenceError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(io_error(parent))
        }
        _ => Ok(()),
    }
}

impl EvidenceStore {
    pub fn new(gaze_log_path: impl Into<PathBuf>, behavior_log_path: impl Into<PathBuf>) -> Self {
        Self {
            gaze: Mutex::new(GazeLog {
                path: gaze_log_path.into(),
                pending: Vec::new(),
            }),
            behavior: Mutex::new(BehaviorLog {
                path: behavior_log_path.into(),
                pending: Vec::new(),
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.gaze_log_path(), config.behavior_log_path())
    }

    pub fn gaze_log_path(&self) -> PathBuf {
        self.gaze.lock().path.clone()
    }

    pub fn behavior_log_path(&self) -> PathBuf {
        self.behavior.lock().path.clone()
    }

    pub fn log_gaze(&self, timestamp: NaiveDateTime, direction: GazeDirection) {
        self.log_note(timestamp, &direction.to_string());
    }

    /// Free-form gaze log line (session start, operator marks)
    pub fn log_note(&self, timestamp: NaiveDateTime, text: &str) {
        let line = format!("{}: {}", format_timestamp(&timestamp), text);
        self.gaze.lock().pending.push(line);
    }

    pub fn append_event(&self, record: IncidentRecord) {
        self.behavior.lock().pending.push(record);
    }

    pub fn log_behavior(&self, timestamp: NaiveDateTime, report: BehaviorReport) {
        self.append_event(IncidentRecord::detection(timestamp, report));
    }

    /// Buffered (gaze lines, behavior records) not yet on disk
    pub fn pending(&self) -> (usize, usize) {
        (self.gaze.lock().pending.len(), self.behavior.lock().pending.len())
    }

    /// Write both buffers. Both logs are attempted even if the first fails;
    /// the first error is returned.
    pub fn flush(&self) -> Result<FlushStats, EvidenceError> {
        let gaze = self.flush_gaze();
        let behavior = self.flush_behavior();
        Ok(FlushStats {
            gaze_lines: gaze?,
            behavior_records: behavior?,
        })
    }

    pub fn flush_gaze(&self) -> Result<usize, EvidenceError> {
        let mut log = self.gaze.lock();
        if log.pending.is_empty() {
            return Ok(0);
        }

        ensure_parent(&log.path)?;
        {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log.path)
                .map_err(io_error(&log.path))?;
            let mut text = log.pending.join("\n");
            text.push('\n');
            file.write_all(text.as_bytes())
                .map_err(io_error(&log.path))?;
        }

        let written = log.pending.len();
        log.pending.clear();
        debug!("Flushed {} gaze line(s) to {}", written, log.path.display());
        Ok(written)
    }

    pub fn flush_behavior(&self) -> Result<usize, EvidenceError> {
        let mut log = self.behavior.lock();
        if log.pending.is_empty() {
            return Ok(0);
        }

        ensure_parent(&log.path)?;
        let mut entries = read_existing(&log.path);
        for record in &log.pending {
            entries.push(serde_json::to_value(record)?);
        }
        write_atomically(&log.path, &entries)?;

        let written = log.pending.len();
        log.pending.clear();
        debug!(
            "Flushed {} behavior record(s) to {} ({} total)",
            written,
            log.path.display(),
            entries.len()
        );
        Ok(written)
    }
}

/// Existing behavior entries. Anything unreadable counts as an empty log;
/// entries are kept as raw JSON so records we cannot type survive rewrites.
fn read_existing(path: &Path) -> Vec<Value> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(
                "Behavior log {} unreadable ({}), starting a new one",
                path.display(),
                e
            );
            return Vec::new();
        }
    };

    if text.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<Value>>(&text) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Behavior log {} is corrupt ({}), starting a new one",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

fn write_atomically(path: &Path, entries: &[Value]) -> Result<(), EvidenceError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let file = File::create(&tmp_path).map_err(io_error(&tmp_path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, entries)?;
        writer.write_all(b"\n").map_err(io_error(&tmp_path))?;
        writer.flush().map_err(io_error(&tmp_path))?;
    }

    fs::rename(&tmp_path, path).map_err(io_error(path))
}
