// src/analysis/mod.rs
//
// Behavioral scoring over the classified direction stream.
//
// Signal flow:
//   GazeDirection (per frame) → SuspicionEngine.observe → is_flagged
//                                                     └→ generate_report → BehaviorReport

pub mod suspicion;

pub use suspicion::{
    BehaviorReport, BehaviorStatus, GazeEvent, SuspicionEngine, SuspicionRules, SuspicionState,
};
