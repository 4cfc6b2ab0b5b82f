// src/detection/mod.rs

mod calibration;
mod classifier;
mod types;

// Re-export public APIs
pub use calibration::{CalibrationAccumulator, CalibrationBaseline, Calibrator, ReadyWait};
pub use classifier::{classify, DirectionClassifier};
pub use types::*;
