// src/error.rs

use thiserror::Error;

/// The frame source could not deliver the next item. The session treats
/// this as end of stream and does not retry.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("capture read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed feed line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("evidence log I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode evidence: {0}")]
    Encode(#[from] serde_json::Error),
}
