use thiserror::Error;

/// Errors returned by dataset operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("speaker key must not be empty")]
    EmptyKey,

    #[error("dimension mismatch for speaker {speaker}: expected {expected}, got {got}")]
    DimensionMismatch {
        speaker: String,
        expected: usize,
        got: usize,
    },

    #[error("parse dataset JSON: {0}")]
    Json(#[from] serde_json::Error),
}
