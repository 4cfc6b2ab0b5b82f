// src/detection/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One frame's worth of estimator output. `None` on either axis means the
/// estimator could not place the pupil (blink, eyes not found).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatioSample {
    pub horizontal: Option<f64>,
    pub vertical: Option<f64>,
}

impl RatioSample {
    pub fn new(horizontal: f64, vertical: f64) -> Self {
        Self {
            horizontal: Some(horizontal),
            vertical: Some(vertical),
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HorizontalDeviation {
    None,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VerticalDeviation {
    None,
    Up,
    Down,
}

/// Classified gaze direction for a single frame.
///
/// Off-center labels are the product of an independent horizontal and
/// vertical deviation; `Gaze { None, None }` is looking at the center.
/// The text form joins the components with a space ("left up"), which is
/// also what ends up in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum GazeDirection {
    Gaze {
        horizontal: HorizontalDeviation,
        vertical: VerticalDeviation,
    },
    Blink,
    NotCalibrated,
}

impl GazeDirection {
    pub const CENTER: GazeDirection = GazeDirection::Gaze {
        horizontal: HorizontalDeviation::None,
        vertical: VerticalDeviation::None,
    };

    pub fn new(horizontal: HorizontalDeviation, vertical: VerticalDeviation) -> Self {
        GazeDirection::Gaze {
            horizontal,
            vertical,
        }
    }

    pub fn is_center(&self) -> bool {
        *self == Self::CENTER
    }

    /// Neither rewarded nor penalized by the suspicion engine
    pub fn is_neutral(&self) -> bool {
        matches!(self, GazeDirection::Blink | GazeDirection::NotCalibrated)
    }

    pub fn is_off_center(&self) -> bool {
        matches!(self, GazeDirection::Gaze { .. }) && !self.is_center()
    }

    pub fn horizontal(&self) -> HorizontalDeviation {
        match self {
            GazeDirection::Gaze { horizontal, .. } => *horizontal,
            _ => HorizontalDeviation::None,
        }
    }

    pub fn vertical(&self) -> VerticalDeviation {
        match self {
            GazeDirection::Gaze { vertical, .. } => *vertical,
            _ => VerticalDeviation::None,
        }
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (horizontal, vertical) = match self {
            GazeDirection::Blink => return f.write_str("blink"),
            GazeDirection::NotCalibrated => return f.write_str("not calibrated"),
            GazeDirection::Gaze {
                horizontal,
                vertical,
            } => (horizontal, vertical),
        };

        let h = match horizontal {
            HorizontalDeviation::None => None,
            HorizontalDeviation::Left => Some("left"),
            HorizontalDeviation::Right => Some("right"),
        };
        let v = match vertical {
            VerticalDeviation::None => None,
            VerticalDeviation::Up => Some("up"),
            VerticalDeviation::Down => Some("down"),
        };

        match (h, v) {
            (None, None) => f.write_str("center"),
            (Some(h), None) => f.write_str(h),
            (None, Some(v)) => f.write_str(v),
            (Some(h), Some(v)) => write!(f, "{} {}", h, v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown gaze direction label: {0:?}")]
pub struct UnknownDirection(pub String);

impl FromStr for GazeDirection {
    type Err = UnknownDirection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(|c: char| c == '+' || c == '_', " ");
        let parts: Vec<&str> = normalized.split_whitespace().collect();

        match parts.as_slice() {
            ["center"] => return Ok(GazeDirection::CENTER),
            ["blink"] => return Ok(GazeDirection::Blink),
            ["not", "calibrated"] => return Ok(GazeDirection::NotCalibrated),
            _ => {}
        }

        let mut horizontal = HorizontalDeviation::None;
        let mut vertical = VerticalDeviation::None;
        for part in &parts {
            match *part {
                "left" if horizontal == HorizontalDeviation::None => {
                    horizontal = HorizontalDeviation::Left
                }
                "right" if horizontal == HorizontalDeviation::None => {
                    horizontal = HorizontalDeviation::Right
                }
                "up" if vertical == VerticalDeviation::None => vertical = VerticalDeviation::Up,
                "down" if vertical == VerticalDeviation::None => {
                    vertical = VerticalDeviation::Down
                }
                _ => return Err(UnknownDirection(s.to_string())),
            }
        }

        if horizontal == HorizontalDeviation::None && vertical == VerticalDeviation::None {
            return Err(UnknownDirection(s.to_string()));
        }
        Ok(GazeDirection::new(horizontal, vertical))
    }
}

impl From<GazeDirection> for String {
    fn from(direction: GazeDirection) -> Self {
        direction.to_string()
    }
}

impl TryFrom<String> for GazeDirection {
    type Error = UnknownDirection;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_log_format() {
        assert_eq!(GazeDirection::CENTER.to_string(), "center");
        assert_eq!(GazeDirection::Blink.to_string(), "blink");
        assert_eq!(GazeDirection::NotCalibrated.to_string(), "not calibrated");
        assert_eq!(
            GazeDirection::new(HorizontalDeviation::Left, VerticalDeviation::Up).to_string(),
            "left up"
        );
        assert_eq!(
            GazeDirection::new(HorizontalDeviation::None, VerticalDeviation::Down).to_string(),
            "down"
        );
    }

    #[test]
    fn test_parse_accepts_alternate_separators() {
        let expected = GazeDirection::new(HorizontalDeviation::Right, VerticalDeviation::Down);
        assert_eq!("right down".parse::<GazeDirection>().unwrap(), expected);
        assert_eq!("right+down".parse::<GazeDirection>().unwrap(), expected);
        assert_eq!(
            "not_calibrated".parse::<GazeDirection>().unwrap(),
            GazeDirection::NotCalibrated
        );
    }

    #[test]
    fn test_parse_rejects_freeform_text() {
        assert!("sideways".parse::<GazeDirection>().is_err());
        assert!("left left".parse::<GazeDirection>().is_err());
        assert!("".parse::<GazeDirection>().is_err());
    }

    #[test]
    fn test_serde_uses_text_form() {
        let direction = GazeDirection::new(HorizontalDeviation::Left, VerticalDeviation::None);
        assert_eq!(serde_json::to_string(&direction).unwrap(), "\"left\"");

        let parsed: Vec<GazeDirection> =
            serde_json::from_str(r#"["center", "left up", "blink"]"#).unwrap();
        assert_eq!(parsed[0], GazeDirection::CENTER);
        assert_eq!(parsed[2], GazeDirection::Blink);
    }

    #[test]
    fn test_category_predicates() {
        assert!(GazeDirection::CENTER.is_center());
        assert!(!GazeDirection::CENTER.is_off_center());
        assert!(GazeDirection::Blink.is_neutral());
        assert!(!GazeDirection::Blink.is_off_center());
        assert!(GazeDirection::new(HorizontalDeviation::None, VerticalDeviation::Up).is_off_center());
    }
}
