// src/analysis/suspicion.rs
//
// Turns the noisy per-frame direction stream into a flag decision.
//
// A single glance away is not suspicious; a sustained one is. Off-center
// frames build a streak, and only a completed streak earns one suspicion
// unit. Centered frames pay suspicion back one unit at a time, so the flag
// needs deviation that outpaces recovery.

use crate::detection::GazeDirection;
use crate::types::Config;
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeEvent {
    pub timestamp: NaiveDateTime,
    pub direction: GazeDirection,
}

#[derive(Debug, Clone)]
pub struct SuspicionRules {
    /// Sliding window capacity (frames)
    pub window_size: usize,
    /// Streak length (frames) that converts into one suspicion unit
    pub min_consecutive_offcenter: u32,
    pub max_suspicious_actions: u32,
    pub offcenter_fraction_threshold: Option<f64>,
}

impl SuspicionRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_size: config.window_size(),
            min_consecutive_offcenter: config.min_consecutive_offcenter(),
            max_suspicious_actions: config.analysis.max_suspicious_actions,
            offcenter_fraction_threshold: config.analysis.offcenter_fraction_threshold,
        }
    }
}

impl Default for SuspicionRules {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Mutable per-subject scoring state.
#[derive(Debug, Clone, Default)]
pub struct SuspicionState {
    pub suspicious_actions: u32,
    /// Goes negative while the subject stays centered; there is no floor.
    pub consecutive_offcenter: i64,
    pub window: VecDeque<GazeEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorStatus {
    #[default]
    Normal,
    Cheating,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorReport {
    #[serde(deserialize_with = "lenient_count")]
    pub suspicious_actions: u32,
    #[serde(deserialize_with = "lenient_history")]
    pub gaze_history: Vec<GazeDirection>,
    #[serde(default)]
    pub current_status: BehaviorStatus,
}

/// Any JSON number, saturated into `u32`. Anything else reads as 0 so the
/// entry still counts as a detection.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let count = match &value {
        Value::Number(n) => n
            .as_u64()
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .or_else(|| n.as_f64().map(|f| f.clamp(0.0, u32::MAX as f64) as u32)),
        _ => None,
    };
    Ok(count.unwrap_or_else(|| {
        debug!("Unreadable suspicious_actions {}, using 0", value);
        0
    }))
}

/// Known labels in order; unknown labels and non-string items are dropped.
fn lenient_history<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<GazeDirection>, D::Error> {
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        debug!("gaze_history is not a list, treated as empty");
        return Ok(Vec::new());
    };

    Ok(items
        .iter()
        .filter_map(|item| match item.as_str().map(str::parse::<GazeDirection>) {
            Some(Ok(direction)) => Some(direction),
            _ => {
                debug!("Dropping gaze label {}", item);
                None
            }
        })
        .collect())
}

pub struct SuspicionEngine {
    rules: SuspicionRules,
    state: SuspicionState,
}

impl SuspicionEngine {
    pub fn new(rules: SuspicionRules) -> Self {
        Self {
            rules,
            state: SuspicionState::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(SuspicionRules::from_config(config))
    }

    pub fn rules(&self) -> &SuspicionRules {
        &self.rules
    }

    pub fn state(&self) -> &SuspicionState {
        &self.state
    }

    pub fn observe(&mut self, direction: GazeDirection) {
        self.observe_at(Local::now().naive_local(), direction);
    }

    pub fn observe_at(&mut self, timestamp: NaiveDateTime, direction: GazeDirection) {
        let state = &mut self.state;

        state.window.push_back(GazeEvent {
            timestamp,
            direction,
        });
        while state.window.len() > self.rules.window_size {
            state.window.pop_front();
        }

        if direction.is_center() {
            state.consecutive_offcenter -= 1;
            state.suspicious_actions = state.suspicious_actions.saturating_sub(1);
        } else if direction.is_neutral() {
            state.consecutive_offcenter = 0;
        } else {
            state.consecutive_offcenter += 1;
            if state.consecutive_offcenter >= self.rules.min_consecutive_offcenter as i64 {
                state.suspicious_actions += 1;
                state.consecutive_offcenter = 0;
                debug!(
                    "Sustained off-center gaze ({}), suspicion now {}",
                    direction, state.suspicious_actions
                );
            }
        }

        self.apply_offcenter_share();
    }

    /// Optional rule: a full window dominated by off-center frames earns a
    /// unit on its own. The older half is dropped so those frames are not
    /// counted a second time.
    fn apply_offcenter_share(&mut self) {
        let Some(threshold) = self.rules.offcenter_fraction_threshold else {
            return;
        };
        let state = &mut self.state;
        if state.window.len() < self.rules.window_size {
            return;
        }

        let off_center = state
            .window
            .iter()
            .filter(|e| e.direction.is_off_center())
            .count();
        let share = off_center as f64 / state.window.len() as f64;

        if share > threshold {
            state.suspicious_actions += 1;
            let half = state.window.len() / 2;
            state.window.drain(..half);
            debug!(
                "Off-center share {:.0}% over window, suspicion now {}",
                share * 100.0,
                state.suspicious_actions
            );
        }
    }

    pub fn is_flagged(&self) -> bool {
        self.state.suspicious_actions >= self.rules.max_suspicious_actions
    }

    /// Snapshot and spend the accumulated suspicion. Not idempotent: the
    /// caller must persist the report before asking for another one.
    pub fn generate_report(&mut self) -> BehaviorReport {
        let report = BehaviorReport {
            suspicious_actions: self.state.suspicious_actions,
            gaze_history: self.state.window.iter().map(|e| e.direction).collect(),
            current_status: if self.is_flagged() {
                BehaviorStatus::Cheating
            } else {
                BehaviorStatus::Normal
            },
        };
        self.state.suspicious_actions = 0;
        report
    }
}
