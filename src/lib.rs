//! Gaze-based exam proctoring.
//!
//! Per-frame pupil ratios from an external estimator are classified against
//! a per-subject calibrated center, scored for sustained off-center
//! attention, and written to a gaze log and a behavior log. The behavior
//! logs are later correlated against operator marks to measure how often a
//! detection was a real cheating attempt.

pub mod analysis;
pub mod config;
pub mod debug;
pub mod detection;
pub mod error;
pub mod evidence;
pub mod pipeline;
pub mod sensor;
pub mod tracker;
pub mod types;

pub use types::Config;
