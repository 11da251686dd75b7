use std::fmt;

use serde::{Deserialize, Serialize};
use spkrec_data::SpeakerKey;

/// Decision of batch recognition for one test identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// The identity's family matches one of the selected speakers.
    pub known: bool,
    /// The accepted speaker, `None` when no model passed the thresholds.
    pub speaker: Option<SpeakerKey>,
}

/// Coarse classification of a [`RecognitionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Recognized,
    /// Known speaker, but no model was accepted.
    Unrecognized,
    /// Not a selected speaker and no model was accepted.
    Unknown,
}

impl RecognitionResult {
    pub fn accepted(known: bool, speaker: SpeakerKey) -> Self {
        Self {
            known,
            speaker: Some(speaker),
        }
    }

    pub fn rejected(known: bool) -> Self {
        Self {
            known,
            speaker: None,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match (&self.speaker, self.known) {
            (Some(_), _) => Outcome::Recognized,
            (None, true) => Outcome::Unrecognized,
            (None, false) => Outcome::Unknown,
        }
    }

    /// The accepted speaker belongs to the family of `identity`.
    pub fn is_correct_for(&self, identity: &SpeakerKey) -> bool {
        self.speaker
            .as_ref()
            .is_some_and(|s| s.is_same_speaker(identity))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recognized => write!(f, "recognized"),
            Self::Unrecognized => write!(f, "unrecognized"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl fmt::Display for RecognitionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.speaker {
            Some(speaker) => write!(f, "{} {speaker}", self.outcome()),
            None => write!(f, "{}", self.outcome()),
        }
    }
}
