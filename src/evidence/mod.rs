// src/evidence/mod.rs
//
// Durable evidence (gaze text log, behavior JSON log) and the offline
// correlation of operator marks against automatic detections.

pub mod correlator;
pub mod record;
pub mod store;

pub use correlator::{
    dominant_direction, load_incident_log, load_stats, total_stats, CorrelationResult,
    EvidenceCorrelator, TotalStats,
};
pub use record::{format_timestamp, EventType, IncidentData, IncidentRecord, TIMESTAMP_FORMAT};
pub use store::{EvidenceStore, FlushStats};
