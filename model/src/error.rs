use thiserror::Error;

/// Errors returned by model training and adaptation.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("no training samples")]
    NoSamples,

    #[error("model order must be positive")]
    ZeroOrder,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("background model is not trained")]
    UntrainedBackground,
}
