// src/pipeline/mod.rs

pub mod metrics;
pub mod session;

pub use metrics::{MetricsSummary, SessionMetrics};
pub use session::{Session, SessionEnd, SessionSummary};
