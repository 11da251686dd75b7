use spkrec_data::{DataError, SpeakerKey};
use spkrec_model::ModelError;
use thiserror::Error;

/// Errors returned by recognizer operations.
#[derive(Debug, Error)]
pub enum RecognizerError {
    #[error("missing speaker model training data")]
    MissingSpeakerData,

    #[error("inconsistent speaker model training data")]
    InconsistentSpeakerData,

    #[error("inconsistent background model training data")]
    InconsistentBackgroundData,

    #[error("inconsistent testing data")]
    InconsistentTestData,

    #[error("incompatible data dimensions: expected {expected}, got {got}")]
    IncompatibleDimensions { expected: usize, got: usize },

    #[error("background model enabled but not created")]
    BackgroundUnavailable,

    #[error("mismatching speaker model ({speaker}) and background model ({background}) dimensions")]
    DimensionMismatch { speaker: usize, background: usize },

    #[error("speaker model '{0}' not found")]
    UnknownSpeaker(SpeakerKey),

    #[error("no speaker models selected")]
    NoSpeakerModels,

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("train model: {0}")]
    Model(#[from] ModelError),
}
