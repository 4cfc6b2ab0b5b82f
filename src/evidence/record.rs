// src/evidence/record.rs
//
// Entries of the behavior log. The three kinds share one JSON array and
// are told apart by which fields are present, in this order:
//   participant_number            → session start
//   event_type = manual mark      → operator mark
//   suspicious_actions + history  → automatic detection

use crate::analysis::BehaviorReport;
use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Local wall-clock time at log resolution (whole seconds)
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

mod timestamp_format {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT).map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentRecord {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub data: IncidentData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ManualCheatingMark,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncidentData {
    SessionStart {
        #[serde(deserialize_with = "participant_id")]
        participant_number: String,
        #[serde(default)]
        message: String,
    },
    ManualMark {
        event_type: EventType,
        #[serde(default)]
        message: String,
    },
    Detection(BehaviorReport),
}

/// Participant ids are typed in by the operator; accept them as JSON
/// strings or bare numbers.
fn participant_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

impl IncidentRecord {
    pub fn session_start(timestamp: NaiveDateTime, participant: impl Into<String>) -> Self {
        Self {
            timestamp,
            data: IncidentData::SessionStart {
                participant_number: participant.into(),
                message: "Session started, participant number recorded".to_string(),
            },
        }
    }

    pub fn manual_mark(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            data: IncidentData::ManualMark {
                event_type: EventType::ManualCheatingMark,
                message: "Operator marked a cheating attempt".to_string(),
            },
        }
    }

    pub fn detection(timestamp: NaiveDateTime, report: BehaviorReport) -> Self {
        Self {
            timestamp,
            data: IncidentData::Detection(report),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.data {
            IncidentData::SessionStart { .. } => "session_start",
            IncidentData::ManualMark { .. } => "manual_mark",
            IncidentData::Detection(_) => "detection",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BehaviorStatus;
    use crate::detection::GazeDirection;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 14)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_kinds_by_present_fields() {
        let records: Vec<IncidentRecord> = serde_json::from_str(
            r#"[
                {"timestamp": "2024-05-14 10:00:00",
                 "data": {"participant_number": "17", "message": "hello"}},
                {"timestamp": "2024-05-14 10:00:05",
                 "data": {"event_type": "manual_cheating_mark", "message": "x"}},
                {"timestamp": "2024-05-14 10:00:07",
                 "data": {"suspicious_actions": 10,
                          "gaze_history": ["left", "left up", "center"],
                          "current_status": "cheating"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(records[0].kind(), "session_start");
        assert_eq!(records[1].kind(), "manual_mark");
        assert_eq!(records[2].kind(), "detection");
        assert_eq!(records[1].timestamp, ts(10, 0, 5));

        match &records[2].data {
            IncidentData::Detection(report) => {
                assert_eq!(report.suspicious_actions, 10);
                assert_eq!(report.gaze_history[2], GazeDirection::CENTER);
                assert_eq!(report.current_status, BehaviorStatus::Cheating);
            }
            other => panic!("expected detection, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_participant_and_missing_status() {
        let record: IncidentRecord = serde_json::from_str(
            r#"{"timestamp": "2024-05-14 10:00:00", "data": {"participant_number": 42}}"#,
        )
        .unwrap();
        assert!(matches!(
            record.data,
            IncidentData::SessionStart { ref participant_number, .. } if participant_number == "42"
        ));

        let record: IncidentRecord = serde_json::from_str(
            r#"{"timestamp": "2024-05-14 10:00:00",
                "data": {"suspicious_actions": 1, "gaze_history": []}}"#,
        )
        .unwrap();
        assert_eq!(record.kind(), "detection");
    }

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let parsed = serde_json::from_str::<IncidentRecord>(
            r#"{"timestamp": "2024-05-14 10:00:00", "data": {"event_type": "coffee_break"}}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_written_form() {
        let record = IncidentRecord::manual_mark(ts(9, 30, 0));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["timestamp"], "2024-05-14 09:30:00");
        assert_eq!(value["data"]["event_type"], "manual_cheating_mark");

        let start = serde_json::to_value(IncidentRecord::session_start(ts(9, 0, 0), "7")).unwrap();
        assert_eq!(start["data"]["participant_number"], "7");
    }

    #[test]
    fn test_now_has_whole_seconds() {
        assert_eq!(now().nanosecond(), 0);
        assert_eq!(format_timestamp(&ts(1, 2, 3)), "2024-05-14 01:02:03");
    }
}
